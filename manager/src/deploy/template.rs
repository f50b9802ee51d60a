//! Generated source files (`filesToCreate`)

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::env::values::EnvValues;
use crate::errors::ManagerError;
use crate::storage::config::FileToCreate;

/// Supported output languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    TypeScript,
    JavaScript,
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "typescript" | "ts" => Ok(TemplateKind::TypeScript),
            "javascript" | "js" => Ok(TemplateKind::JavaScript),
            _ => Err(s.to_string()),
        }
    }
}

/// Merge preset properties with the environment-sourced ones.
///
/// Environment values win on key conflicts. Variables that are not set are
/// left out of the object.
pub fn build_object(entry: &FileToCreate, env: &EnvValues) -> Map<String, Value> {
    let mut object = entry.preset_properties.clone();
    for name in &entry.properties {
        if let Some(value) = env.get(name) {
            object.insert(name.clone(), Value::String(value.to_string()));
        }
    }
    object
}

/// Render the source file for `entry`
pub fn render(entry: &FileToCreate, env: &EnvValues) -> Result<String, ManagerError> {
    let kind = TemplateKind::from_str(&entry.template).map_err(|template| {
        ManagerError::UnsupportedTemplate {
            template,
            path: entry.path.clone(),
        }
    })?;

    let object = serde_json::to_string_pretty(&Value::Object(build_object(entry, env)))?;
    let root = &entry.root_variable_name;

    let body = match kind {
        TemplateKind::TypeScript => format!("export const {} = {};\n", root, object),
        TemplateKind::JavaScript => format!("module.exports.{} = {};\n", root, object),
    };

    Ok(format!("// Generated by containerizer. Do not edit.\n{}", body))
}
