use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 解码后的仪器记录。
///
/// 字段名到值的映射，结构由帧类型决定，没有固定 schema；
/// 输出插件通过点分路径（如 `cpm.value`）读取字段。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从单个字段构造记录。
    pub fn with_field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut record = Self::new();
        record.insert(key, value);
        record
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 按点分路径读取嵌套字段，任一段缺失即返回 None。
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
