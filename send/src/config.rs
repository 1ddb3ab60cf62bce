use mlua::{Lua, LuaSerdeExt};
use notify::Urgency;
use serde::Deserialize;
use std::{fs, path::PathBuf};

/// Defaults applied before command-line flags.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub app_name: Box<str>,
    pub urgency: Urgency,
    pub expire_time: i32,
    pub category: Option<Box<str>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "notify-send".into(),
            urgency: Urgency::Normal,
            expire_time: -1,
            category: None,
        }
    }
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = if let Some(path) = path {
            path
        } else {
            Self::path()?
        };

        let lua_code = fs::read_to_string(&config_path).unwrap_or_default();
        Self::from_lua(&lua_code)
    }

    /// Evaluates a config chunk. The chunk may either fill the `config`
    /// table or return a table of its own.
    pub fn from_lua(lua_code: &str) -> anyhow::Result<Self> {
        let lua = Lua::new();

        let lua_result = lua
            .load(format!(
                r#"
                local config = {{}}
                local env = {{ config = config }}
                local user_return = (function()
                    local _ENV = env
                    {lua_code}
                end)()

                if type(user_return) == 'table' then
                    for k, v in pairs(user_return) do
                        config[k] = v
                    end
                end
                return config
                "#
            ))
            .eval()
            .map_err(|e| anyhow::anyhow!("Lua evaluation error: {}", e))?;

        let config: Config = lua
            .from_value(lua_result)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {}", e))?;

        Ok(config)
    }

    pub fn path() -> anyhow::Result<PathBuf> {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))?;

        Ok(config_dir.join("notify-send/config.lua"))
    }
}
