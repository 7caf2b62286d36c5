use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::backend::Backend;

#[derive(Debug, Tabled, Serialize)]
pub struct BackendRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Path")]
    pub path: String,
}

impl From<&Backend> for BackendRow {
    fn from(backend: &Backend) -> Self {
        Self {
            id: backend.id().to_string(),
            kind: backend.kind().to_string(),
            path: backend.path().display().to_string(),
        }
    }
}

/// One git reference of one repository
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct RefRow {
    #[tabled(rename = "Repository")]
    pub repository: String,
    #[tabled(rename = "Reference")]
    pub name: String,
    #[tabled(rename = "Target")]
    pub target: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn backend_table(rows: &[BackendRow]) -> String {
    render(rows)
}

pub fn ref_table(rows: &[RefRow]) -> String {
    render(rows)
}
