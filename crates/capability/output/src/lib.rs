//! # 输出能力模块
//!
//! 把仪器记录按条件转发到外部输出（MQTT、REST 等）。
//!
//! ```text
//! PortSession ──record──► OutputManager::dispatch
//!                              │  每个绑定：告警门 OR 定时门
//!                              ▼
//!                        OutputPlugin::send_data（独立任务）
//!                              │ Ok
//!                              ▼
//!                        last_send_at = now
//! ```
//!
//! - 告警门：两个条件按 `alrmbool`（and/or）组合，满足后受 `alrmfrequency` 限频
//! - 定时门：距离上次成功发送超过 `frequency` 秒
//! - 两者同时满足只发送一次；发送失败不更新时间，也不重试

mod alarm;
mod binding;
mod error;
mod manager;
mod mqtt;
mod plugin;
mod rest;
mod settings;

pub use alarm::{alarm_triggered, check_condition, leading_number};
pub use binding::{BindingSnapshot, OutputBinding, Trigger};
pub use error::OutputError;
pub use manager::OutputManager;
pub use mqtt::{MqttOutput, MqttOutputConfig};
pub use plugin::{FieldMapping, OutputFactory, OutputPlugin, PluginRegistry};
pub use rest::{RestMethod, RestOutput, RestOutputConfig};
pub use settings::{AlarmBoolOp, AlarmCondition, Comparator, OutputSettings};
