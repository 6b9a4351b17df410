//! 从JSON文件加载目录配置

use crate::catalog::Catalog;
use crate::executor::{Executor, FieldAliases};
use std::fs;
use std::path::Path;

/// 目录配置错误
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 加载 `path` 处的目录
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog, ConfigError> {
    Catalog::from_json_file(path)
}

impl Catalog {
    /// 从JSON文件加载目录
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "catalog file not found: {}",
                path_ref.display()
            )));
        }

        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("cannot read catalog file {}: {}", path_ref.display(), e))
        })?;

        Self::from_json_str(&content).map_err(|e| {
            ConfigError::new(format!("{} ({})", e.message, path_ref.display()))
        })
    }

    /// 从JSON文本解析目录
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let catalog: Catalog = serde_json::from_str(content)
            .map_err(|e| ConfigError::new(format!("invalid catalog JSON: {}", e)))?;

        for table in &catalog.tables {
            if table.name.trim().is_empty() {
                return Err(ConfigError::new("table with an empty name".to_string()));
            }
        }

        Ok(catalog)
    }

    /// 此目录描述的执行器别名表
    pub fn field_aliases(&self) -> FieldAliases {
        FieldAliases::from_mappings(self.field_aliases.clone())
    }

    /// 带有此目录别名与配置的执行器
    pub fn build_executor(&self) -> Executor {
        Executor::with_aliases(self.field_aliases()).with_config(self.executor)
    }
}
