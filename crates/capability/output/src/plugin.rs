//! 输出插件接口与插件注册表

use crate::error::OutputError;
use crate::mqtt::MqttOutput;
use crate::rest::RestOutput;
use async_trait::async_trait;
use domain::Record;
use relay_storage::OutputRecord;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 输出插件
///
/// `send_data` 返回的 future 只完成一次；永不完成的发送不会被分发引擎超时处理。
#[async_trait]
pub trait OutputPlugin: Send + Sync {
    /// 按路径取记录字段，告警判定使用；默认按点分路径查找。
    fn resolve_mapping(&self, path: &str, record: &Record) -> Option<Value> {
        record.resolve(path).cloned()
    }

    async fn send_data(&self, record: &Record) -> Result<(), OutputError>;
}

/// 插件工厂：由输出配置构造插件实例
pub type OutputFactory =
    Arc<dyn Fn(&OutputRecord) -> Result<Arc<dyn OutputPlugin>, OutputError> + Send + Sync>;

/// 按 output_type 查找插件工厂
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, OutputFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置插件：`mqtt`、`rest`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("mqtt", |record: &OutputRecord| {
            let plugin: Arc<dyn OutputPlugin> = Arc::new(MqttOutput::from_record(record)?);
            Ok(plugin)
        });
        registry.register("rest", |record: &OutputRecord| {
            let plugin: Arc<dyn OutputPlugin> = Arc::new(RestOutput::from_record(record)?);
            Ok(plugin)
        });
        registry
    }

    pub fn register<F>(&mut self, output_type: impl Into<String>, factory: F)
    where
        F: Fn(&OutputRecord) -> Result<Arc<dyn OutputPlugin>, OutputError> + Send + Sync + 'static,
    {
        self.factories.insert(output_type.into(), Arc::new(factory));
    }

    pub fn supports(&self, output_type: &str) -> bool {
        self.factories.contains_key(output_type)
    }

    pub fn output_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn create(&self, record: &OutputRecord) -> Result<Arc<dyn OutputPlugin>, OutputError> {
        let factory = self
            .factories
            .get(&record.output_type)
            .ok_or_else(|| OutputError::UnsupportedType(record.output_type.clone()))?;
        factory(record)
    }
}

/// 字段映射：`{ "输出键": "记录字段路径" }`，为空时发送整条记录。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 生成发送内容；映射的字段在记录中缺失时省略。
    pub fn payload(&self, record: &Record) -> Value {
        if self.0.is_empty() {
            return record.to_value();
        }
        let mut payload = Map::new();
        for (key, path) in &self.0 {
            if let Some(value) = record.resolve(path) {
                payload.insert(key.clone(), value.clone());
            }
        }
        Value::Object(payload)
    }
}

/// 解析插件自身的配置段
pub(crate) fn parse_config<T>(record: &OutputRecord) -> Result<T, OutputError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(&record.config).map_err(|err| {
        OutputError::Config(format!(
            "{} output {}: {}",
            record.output_type, record.output_id, err
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl OutputPlugin for Noop {
        async fn send_data(&self, _record: &Record) -> Result<(), OutputError> {
            Ok(())
        }
    }

    fn descriptor(output_type: &str) -> OutputRecord {
        OutputRecord {
            output_id: "out-1".to_string(),
            instrument_id: "geiger-1".to_string(),
            enabled: true,
            output_type: output_type.to_string(),
            config: json!({}),
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = PluginRegistry::new();
        registry.register("noop", |_record: &OutputRecord| {
            let plugin: Arc<dyn OutputPlugin> = Arc::new(Noop);
            Ok(plugin)
        });
        assert!(registry.supports("noop"));
        assert!(registry.create(&descriptor("noop")).is_ok());
        assert!(matches!(
            registry.create(&descriptor("safecast")),
            Err(OutputError::UnsupportedType(kind)) if kind == "safecast"
        ));
    }

    #[test]
    fn test_default_types() {
        assert_eq!(
            PluginRegistry::with_defaults().output_types(),
            vec!["mqtt".to_string(), "rest".to_string()]
        );
    }

    #[test]
    fn test_field_mapping_payload() {
        let record = Record::with_field("cpm", json!({ "value": 42, "valid": true }));
        assert_eq!(FieldMapping::default().payload(&record), record.to_value());

        let mapping = FieldMapping::new([
            ("cpm".to_string(), "cpm.value".to_string()),
            ("missing".to_string(), "counts.uptime".to_string()),
        ]);
        assert_eq!(mapping.payload(&record), json!({ "cpm": 42 }));
    }

    #[test]
    fn test_default_resolve_mapping() {
        let record = Record::with_field("cpm", json!({ "value": 7 }));
        assert_eq!(Noop.resolve_mapping("cpm.value", &record), Some(json!(7)));
        assert_eq!(Noop.resolve_mapping("cpm.nope", &record), None);
    }
}
