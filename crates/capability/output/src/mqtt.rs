//! MQTT 输出插件
//!
//! ```json
//! { "host": "broker.local", "port": 1883, "topic": "lab/geiger", "qos": 1,
//!   "timeout_ms": 10000, "mappings": { "cpm": "cpm.value" } }
//! ```
//!
//! 发送只在报文真正送达后才算成功：QoS 0 以报文写出为准，QoS 1 等待 PUBACK，
//! QoS 2 等待 PUBCOMP。未连接 broker 或超时均返回 `OutputError::Send`。

use crate::error::OutputError;
use crate::plugin::{FieldMapping, OutputPlugin, parse_config};
use async_trait::async_trait;
use domain::Record;
use relay_storage::OutputRecord;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct MqttOutputConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
    #[serde(default)]
    pub client_id: Option<String>,
    /// 等待送达确认的上限
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub mappings: FieldMapping,
}

fn default_port() -> u16 {
    1883
}

fn default_qos() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// eventloop 观察到的送达进度
#[derive(Debug, Clone)]
enum Delivery {
    /// 报文已写出，携带 pkid（QoS 0 为 0）
    Written(u16),
    /// 收到 PUBACK / PUBCOMP
    Acked(u16),
    /// 连接断开
    Lost(String),
}

/// eventloop 任务与插件共享的连接状态
struct LinkState {
    connected: AtomicBool,
    closing: AtomicBool,
    deliveries: broadcast::Sender<Delivery>,
}

/// 发布记录到指定 topic；eventloop 在后台任务中运行，插件释放时先断开连接再退出。
pub struct MqttOutput {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    retain: bool,
    timeout: Duration,
    mappings: FieldMapping,
    link: Arc<LinkState>,
    // 一次只有一条报文在途，送达事件才能与发送对应
    send_lock: Mutex<()>,
    eventloop: JoinHandle<()>,
}

impl MqttOutput {
    pub fn from_record(record: &OutputRecord) -> Result<Self, OutputError> {
        let config: MqttOutputConfig = parse_config(record)?;
        Self::connect(config, &record.output_id)
    }

    pub fn connect(config: MqttOutputConfig, output_id: &str) -> Result<Self, OutputError> {
        if config.topic.trim().is_empty() {
            return Err(OutputError::Config("mqtt topic is empty".to_string()));
        }
        if config.timeout_ms == 0 {
            return Err(OutputError::Config("mqtt timeout_ms must be positive".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| OutputError::Config("mqtt output requires a tokio runtime".to_string()))?;

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("relay-output-{}", uuid::Uuid::new_v4()));
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
        {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 10);
        let (deliveries, _) = broadcast::channel(64);
        let link = Arc::new(LinkState {
            connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            deliveries,
        });
        let eventloop = runtime.spawn(drive_eventloop(
            eventloop,
            Arc::clone(&link),
            output_id.to_string(),
            format!("{}:{}", config.host, config.port),
        ));

        Ok(Self {
            client,
            topic: config.topic,
            qos: qos_from_u8(config.qos),
            retain: config.retain,
            timeout: Duration::from_millis(config.timeout_ms),
            mappings: config.mappings,
            link,
            send_lock: Mutex::new(()),
            eventloop,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 已收到 CONNACK 且之后未断开
    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    async fn await_delivery(
        &self,
        deliveries: &mut broadcast::Receiver<Delivery>,
    ) -> Result<(), OutputError> {
        let mut pkid = None;
        loop {
            match deliveries.recv().await {
                Ok(Delivery::Written(id)) if pkid.is_none() => {
                    if self.qos == QoS::AtMostOnce {
                        return Ok(());
                    }
                    pkid = Some(id);
                }
                Ok(Delivery::Acked(id)) if pkid == Some(id) => return Ok(()),
                Ok(Delivery::Lost(reason)) => return Err(OutputError::Send(reason)),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(OutputError::Send("mqtt event loop stopped".to_string()));
                }
            }
        }
    }
}

async fn drive_eventloop(
    mut eventloop: EventLoop,
    link: Arc<LinkState>,
    output_id: String,
    broker: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                link.connected.store(true, Ordering::SeqCst);
                info!(target: "relay.output", output_id = %output_id, broker = %broker, "mqtt_connected");
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                let _ = link.deliveries.send(Delivery::Acked(ack.pkid));
            }
            Ok(Event::Incoming(Packet::PubComp(comp))) => {
                let _ = link.deliveries.send(Delivery::Acked(comp.pkid));
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                let _ = link.deliveries.send(Delivery::Written(pkid));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) if link.closing.load(Ordering::SeqCst) => {
                break;
            }
            Ok(_) => {}
            Err(err) => {
                link.connected.store(false, Ordering::SeqCst);
                let _ = link.deliveries.send(Delivery::Lost(err.to_string()));
                if link.closing.load(Ordering::SeqCst) {
                    break;
                }
                warn!(
                    target: "relay.output",
                    output_id = %output_id,
                    broker = %broker,
                    error = %err,
                    "mqtt_eventloop_error"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    debug!(target: "relay.output", output_id = %output_id, "mqtt_eventloop_stopped");
}

impl Drop for MqttOutput {
    fn drop(&mut self) {
        self.link.closing.store(true, Ordering::SeqCst);
        // 发出 DISCONNECT 后 eventloop 自行退出；请求队列已满时直接终止
        if self.client.try_disconnect().is_err() {
            self.eventloop.abort();
        }
    }
}

#[async_trait]
impl OutputPlugin for MqttOutput {
    async fn send_data(&self, record: &Record) -> Result<(), OutputError> {
        let payload = serde_json::to_vec(&self.mappings.payload(record))
            .map_err(|err| OutputError::Send(err.to_string()))?;

        let _in_flight = self.send_lock.lock().await;
        if !self.is_connected() {
            return Err(OutputError::Send(format!(
                "mqtt broker not connected (topic {})",
                self.topic
            )));
        }
        let mut deliveries = self.link.deliveries.subscribe();
        debug!(
            target: "relay.output",
            topic = %self.topic,
            payload_size = payload.len(),
            "mqtt_publish"
        );
        self.client
            .publish(self.topic.clone(), self.qos, self.retain, payload)
            .await
            .map_err(|err| OutputError::Send(err.to_string()))?;

        tokio::time::timeout(self.timeout, self.await_delivery(&mut deliveries))
            .await
            .map_err(|_| {
                OutputError::Send(format!(
                    "mqtt delivery not confirmed within {} ms",
                    self.timeout.as_millis()
                ))
            })?
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
