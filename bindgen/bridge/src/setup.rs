//! Host setup: from a loaded module to a populated interpreter namespace.

use crate::binding::DuplicatePolicy;
use crate::namespace::{BindingTable, Constructor, Global, Interpreter};
use crate::value::Value;
use crate::Bridge;
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_layout::{resolve, Layout, ResolvedApi};
use raybridge_parser::api::{ApiDescription, DefineValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The raylib subset bundled with the bridge.
pub const EMBEDDED_API: &str = include_str!("../api/raylib_subset.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    #[default]
    Embedded,
    /// A `raylib_api.json`-shaped file.
    File(PathBuf),
}

/// Which named colors are installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Every `COLOR` define, as a frozen packed value.
    #[default]
    Auto,
    /// None; scripts build their own with the `Color` constructor.
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub api: ApiSource,
    pub palette: Palette,
    pub duplicates: DuplicatePolicy,
}

impl SetupConfig {
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(json).map_err(|e| BridgeError::Api {
            message: format!("invalid setup config: {e}"),
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, BridgeError> {
        let json = std::fs::read_to_string(path).map_err(|e| BridgeError::Api {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }
}

impl ApiSource {
    pub fn load(&self) -> Result<ApiDescription, BridgeError> {
        match self {
            ApiSource::Embedded => ApiDescription::from_json(EMBEDDED_API),
            ApiSource::File(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| BridgeError::Api {
                    message: format!("cannot read {}: {e}", path.display()),
                })?;
                ApiDescription::from_json(&json)
            }
        }
    }
}

/// The result of a successful [`setup`].
#[derive(Debug)]
pub struct Session {
    pub bridge: Bridge,
    pub table: BindingTable,
    /// API functions that were not bound, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Bind everything the module exports and install it into `interpreter`.
///
/// Functions whose arguments and result are all plain numbers are bound
/// raw, the rest adapted. API functions the module does not export, or
/// whose types cannot be marshalled, are skipped with a warning. Nothing is
/// installed unless every step succeeds.
pub fn setup(
    module: SharedModule,
    interpreter: &mut dyn Interpreter,
    config: &SetupConfig,
) -> Result<Session, BridgeError> {
    let mut bridge = Bridge::initialize(module)?.with_policy(config.duplicates);
    let api = resolve(&config.api.load()?)?;
    tracing::info!(
        functions = api.functions.len(),
        structs = api.types.len(),
        "API resolved"
    );

    let mut skipped: Vec<(String, String)> = api
        .skipped
        .iter()
        .map(|(name, err)| (name.clone(), err.to_string()))
        .collect();

    for function in &api.functions {
        if !bridge.module().borrow().has_export(&function.name) {
            tracing::warn!(function = %function.name, "not exported by the native module; skipped");
            skipped.push((function.name.clone(), "not exported".into()));
            continue;
        }
        if function.signature.is_raw() {
            bridge.bind_raw(&function.name, &function.name)?;
        } else {
            bridge.bind_adapted(&function.name, &function.name, function.signature.clone())?;
        }
    }
    for (name, reason) in &api.skipped {
        tracing::warn!(function = %name, %reason, "cannot be marshalled; skipped");
    }

    let table = build_table(&bridge, &api, config)?;
    table.install(interpreter, config.duplicates)?;
    tracing::info!(
        bound = bridge.len(),
        skipped = skipped.len(),
        "setup complete"
    );

    Ok(Session {
        bridge,
        table,
        skipped,
    })
}

fn build_table(
    bridge: &Bridge,
    api: &ResolvedApi,
    config: &SetupConfig,
) -> Result<BindingTable, BridgeError> {
    let policy = config.duplicates;
    let mut table = BindingTable::from_bridge(bridge);

    for (name, layout) in api.types.entries() {
        let constructor = Constructor::new(Rc::clone(layout), bridge.module());
        table.insert(name, Global::Constructor(constructor), policy)?;
    }

    let color = api
        .types
        .lookup("Color")
        .cloned()
        .unwrap_or_else(|| Rc::new(Layout::color()));

    for (name, value) in &api.constants {
        let global = match value {
            DefineValue::Color(rgba) => {
                if config.palette == Palette::Manual {
                    continue;
                }
                let values: Vec<Value> = rgba.iter().map(|&c| Value::Int(c as i64)).collect();
                let packed = bridge.define_packed(&color, &values)?;
                packed.freeze();
                Global::Packed(packed)
            }
            DefineValue::Int(v) => Global::Constant(Value::Int(*v)),
            DefineValue::Float(v) => Global::Constant(Value::Float(*v)),
            DefineValue::Str(s) => Global::Constant(Value::Str(s.clone())),
        };
        table.insert(name, global, policy)?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SetupConfig::from_json("{}").unwrap();
        assert_eq!(config, SetupConfig::default());
        assert_eq!(config.api, ApiSource::Embedded);
        assert_eq!(config.palette, Palette::Auto);
        assert_eq!(config.duplicates, DuplicatePolicy::Reject);
    }

    #[test]
    fn config_variants() {
        let config = SetupConfig::from_json(
            r#"{ "api": { "file": "raylib_api.json" }, "palette": "manual", "duplicates": "overwrite" }"#,
        )
        .unwrap();
        assert_eq!(config.api, ApiSource::File(PathBuf::from("raylib_api.json")));
        assert_eq!(config.palette, Palette::Manual);
        assert_eq!(config.duplicates, DuplicatePolicy::Overwrite);
    }

    #[test]
    fn bad_config_is_an_api_error() {
        let err = SetupConfig::from_json(r#"{ "palette": "rainbow" }"#).unwrap_err();
        assert!(err.is_setup_error());
        assert!(err.to_string().contains("invalid setup config"));
    }

    #[test]
    fn embedded_api_resolves() {
        let api = resolve(&ApiSource::Embedded.load().unwrap()).unwrap();
        assert_eq!(api.types.lookup("Color").unwrap().size, 4);
        assert_eq!(api.types.lookup("Font").unwrap().size, 40);
        let colors = api
            .constants
            .values()
            .filter(|v| matches!(v, DefineValue::Color(_)))
            .count();
        assert_eq!(colors, 26);
        assert_eq!(api.constants["RED"], DefineValue::Color([230, 41, 55, 255]));
    }

    #[test]
    fn missing_api_file() {
        let err = ApiSource::File(PathBuf::from("/nonexistent/raylib_api.json"))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
