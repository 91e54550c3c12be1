// restorectl/src/restore/request.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extract::{schemas_from_text, tables_from_text};
use crate::naming::NameInferenceEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupSource {
    Path { path: String },
    Url { url: String },
}

impl BackupSource {
    /// `http://` and `https://` sources are URLs, anything else is a server-side path.
    pub fn classify(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            BackupSource::Url { url: source.to_string() }
        } else {
            BackupSource::Path { path: source.to_string() }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum DatabaseMode {
    Exists,
    #[default]
    Create,
    DropAndCreate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RestoreScope {
    Full,
    Partial {
        objects: Vec<String>,
        restore_schema: bool,
        restore_indexes: bool,
    },
}

/// Body of `/api/v1/restore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub destination: usize,
    pub backup: BackupSource,
    pub database_name: String,
    pub database: DatabaseMode,
    pub restore: RestoreScope,
    pub ignore_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No destination selected")]
    MissingDestination,
    #[error("Backup path or URL is empty")]
    EmptyBackup,
    #[error("Database name is empty")]
    EmptyDatabaseName,
    #[error("Object list must name at least one schema or table")]
    EmptyObjectList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreKind {
    #[default]
    Full,
    Partial,
}

/// User selections for a restore, validated into a [`RestoreRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreForm {
    pub destination: Option<usize>,
    pub backup: String,
    pub database_name: String,
    pub database: DatabaseMode,
    pub kind: RestoreKind,
    /// Free-form list separated by whitespace and/or commas.
    pub objects: String,
    pub restore_schema: bool,
    pub restore_indexes: bool,
    pub ignore_errors: bool,
}

impl RestoreForm {
    pub fn new(destination: Option<usize>) -> Self {
        RestoreForm {
            destination,
            ..Default::default()
        }
    }

    /// Sets the backup source and, when a name pattern matches, the database name.
    /// A non-matching source leaves the database name as it was.
    pub fn set_backup(&mut self, backup: &str, engine: &NameInferenceEngine) {
        self.backup = backup.to_string();
        if let Some(name) = engine.infer(backup) {
            tracing::debug!(backup, name = %name, "Inferred database name");
            self.database_name = name;
        }
    }

    pub fn backup_source(&self) -> BackupSource {
        BackupSource::classify(&self.backup)
    }

    /// Fills the object list with the tables referenced by pasted SQL.
    pub fn fill_tables_from(&mut self, text: &str) {
        self.kind = RestoreKind::Partial;
        self.objects = tables_from_text(text).join(", ");
    }

    /// Fills the object list with the schemas referenced by pasted SQL.
    pub fn fill_schemas_from(&mut self, text: &str) {
        self.kind = RestoreKind::Partial;
        self.objects = schemas_from_text(text).join(", ");
    }

    pub fn object_list(&self) -> Vec<String> {
        split_objects(&self.objects)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> Result<RestoreRequest, ValidationError> {
        let destination = self.destination.ok_or(ValidationError::MissingDestination)?;
        if self.backup.is_empty() {
            return Err(ValidationError::EmptyBackup);
        }
        if self.database_name.is_empty() {
            return Err(ValidationError::EmptyDatabaseName);
        }

        let restore = match self.kind {
            RestoreKind::Full => RestoreScope::Full,
            RestoreKind::Partial => {
                if !self.objects.chars().any(is_word_char) {
                    return Err(ValidationError::EmptyObjectList);
                }
                RestoreScope::Partial {
                    objects: self.object_list(),
                    restore_schema: self.restore_schema,
                    restore_indexes: self.restore_indexes,
                }
            }
        };

        Ok(RestoreRequest {
            destination,
            backup: self.backup_source(),
            database_name: self.database_name.clone(),
            database: self.database,
            restore,
            ignore_errors: self.ignore_errors,
        })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits on runs of whitespace and commas.
pub fn split_objects(objects: &str) -> Vec<String> {
    objects
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rewrites every separator to the kind that is currently in the minority.
pub fn convert_slashes(path: &str) -> String {
    let forward = path.matches('/').count();
    let backward = path.matches('\\').count();
    if forward > backward {
        path.replace('/', "\\")
    } else {
        path.replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{CaseMode, NamePattern, NamePatterns};
    use serde_json::json;

    fn valid_form() -> RestoreForm {
        RestoreForm {
            destination: Some(1),
            backup: "/data/backup_shop_20230101.sql".into(),
            database_name: "shop".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_restore_serializes_to_wire_shape() -> anyhow::Result<()> {
        let request = valid_form().build()?;
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({
                "destination": 1,
                "backup": {"type": "Path", "path": "/data/backup_shop_20230101.sql"},
                "database_name": "shop",
                "database": "Create",
                "restore": {"type": "Full"},
                "ignore_errors": false
            })
        );
        Ok(())
    }

    #[test]
    fn test_partial_restore_with_url_backup() -> anyhow::Result<()> {
        let form = RestoreForm {
            backup: "https://backups.example.com/shop.dump".into(),
            database: DatabaseMode::DropAndCreate,
            kind: RestoreKind::Partial,
            objects: "sales.orders,  sales.customers\nhr".into(),
            restore_indexes: true,
            ignore_errors: true,
            ..valid_form()
        };
        let value = serde_json::to_value(form.build()?)?;
        assert_eq!(value["backup"], json!({"type": "Url", "url": "https://backups.example.com/shop.dump"}));
        assert_eq!(value["database"], json!("DropAndCreate"));
        assert_eq!(
            value["restore"],
            json!({
                "type": "Partial",
                "objects": ["sales.orders", "sales.customers", "hr"],
                "restore_schema": false,
                "restore_indexes": true
            })
        );
        Ok(())
    }

    #[test]
    fn test_validation_failures() {
        let form = RestoreForm { destination: None, ..valid_form() };
        assert_eq!(form.build(), Err(ValidationError::MissingDestination));

        let form = RestoreForm { backup: String::new(), ..valid_form() };
        assert_eq!(form.build(), Err(ValidationError::EmptyBackup));

        let form = RestoreForm { database_name: String::new(), ..valid_form() };
        assert_eq!(form.build(), Err(ValidationError::EmptyDatabaseName));

        let form = RestoreForm {
            kind: RestoreKind::Partial,
            objects: " ,, \n".into(),
            ..valid_form()
        };
        assert_eq!(form.build(), Err(ValidationError::EmptyObjectList));
    }

    #[test]
    fn test_object_list_check_is_permissive() {
        let form = RestoreForm {
            kind: RestoreKind::Partial,
            objects: "...x...".into(),
            ..valid_form()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_fill_from_pasted_sql_switches_to_partial() {
        let mut form = valid_form();
        form.fill_tables_from("SELECT * FROM Sales.Orders o JOIN sales.customers c ON o.id = c.id");
        assert_eq!(form.kind, RestoreKind::Partial);
        assert_eq!(form.objects, "sales.customers, sales.orders");

        form.fill_schemas_from("update hr.staff set x = 1; select 1 from sales.orders");
        assert_eq!(form.objects, "hr, sales");
    }

    #[test]
    fn test_set_backup_infers_or_keeps_name() {
        let engine = NameInferenceEngine::new(NamePatterns::from(vec![NamePattern::new(
            r"/backup_(\w+)_\d+\.sql$",
            "$1",
            CaseMode::Upper,
        )]));
        let mut form = RestoreForm::new(Some(0));
        form.database_name = "previous".into();

        form.set_backup("/data/other.dump", &engine);
        assert_eq!(form.database_name, "previous");

        form.set_backup("/data/backup_shop_20230101.sql", &engine);
        assert_eq!(form.database_name, "SHOP");
    }

    #[test]
    fn test_convert_slashes() {
        assert_eq!(convert_slashes("/mnt/backups/shop.dump"), r"\mnt\backups\shop.dump");
        assert_eq!(convert_slashes(r"C:\backups\shop.dump"), "C:/backups/shop.dump");
        assert_eq!(convert_slashes("shop.dump"), "shop.dump");
    }
}
