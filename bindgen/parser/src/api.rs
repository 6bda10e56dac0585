//! Model of a raylib-style API description (`raylib_api.json`).
//!
//! Only the parts the bridge consumes are modelled; unknown keys such as
//! `callbacks` are ignored.

use raybridge_common::error::BridgeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDescription {
    #[serde(default)]
    pub defines: Vec<ApiDefine>,
    #[serde(default)]
    pub structs: Vec<ApiStruct>,
    #[serde(default)]
    pub aliases: Vec<ApiAlias>,
    #[serde(default)]
    pub enums: Vec<ApiEnum>,
    #[serde(default)]
    pub functions: Vec<ApiFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDefine {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStruct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<ApiField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiField {
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAlias {
    #[serde(rename = "type")]
    pub target: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnum {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub values: Vec<ApiEnumValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnumValue {
    pub name: String,
    pub value: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFunction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "returnType")]
    pub return_type: String,
    // raylib omits `params` for nullary functions.
    #[serde(default)]
    pub params: Vec<ApiParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiParam {
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
}

/// A define the bridge can install as a global.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
    Int(i64),
    Float(f64),
    Str(String),
    Color([u8; 4]),
}

impl ApiDescription {
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(json).map_err(|e| BridgeError::Api {
            message: format!("invalid API description: {e}"),
        })
    }

    pub fn function(&self, name: &str) -> Option<&ApiFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl ApiDefine {
    /// Decode the define, or `None` for kinds with no runtime value
    /// (guards, macros, unknown expressions).
    pub fn decode(&self) -> Result<Option<DefineValue>, BridgeError> {
        let value = match self.kind.as_str() {
            "COLOR" => {
                let text = self.value.as_str().unwrap_or_default();
                Some(DefineValue::Color(parse_color_literal(&self.name, text)?))
            }
            "INT" => self.number().map(|v| DefineValue::Int(v as i64)),
            "FLOAT" | "FLOAT_MATH" | "DOUBLE" => self.number().map(DefineValue::Float),
            "STRING" => self.value.as_str().map(|s| DefineValue::Str(s.to_string())),
            _ => None,
        };
        Ok(value)
    }

    // Numbers may be stored as JSON numbers or as C literals like "3.14159265358979323846f".
    fn number(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().trim_end_matches(['f', 'F']).parse().ok(),
            _ => None,
        }
    }
}

/// Parse `CLITERAL(Color){ 230, 41, 55, 255 }` into its four channels.
pub fn parse_color_literal(name: &str, text: &str) -> Result<[u8; 4], BridgeError> {
    let bad = || BridgeError::Api {
        message: format!("define {name}: malformed color literal '{text}'"),
    };
    let body = text
        .split_once('{')
        .and_then(|(_, rest)| rest.split_once('}'))
        .map(|(inner, _)| inner)
        .ok_or_else(bad)?;

    let channels: Vec<u8> = body
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;

    channels.try_into().map_err(|_| bad())
}
