//! Declarative node metadata: the fields a flow editor renders, how they are
//! grouped and what children a branching node offers.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::connection::CONNECTION_TYPE;
use crate::node::Branch;

pub const NODE_COLOR: &str = "#ffb100";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    #[serde(rename = "connection")]
    Connection,
    #[serde(rename = "cognigyText")]
    Text,
    #[serde(rename = "textArray")]
    TextArray,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "toggle")]
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl FieldParams {
    fn is_empty(&self) -> bool {
        *self == FieldParams::default()
    }
}

/// Show a field only while another field holds a given value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "FieldParams::is_empty")]
    pub params: FieldParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl FieldDescriptor {
    pub fn new(key: &str, field_type: FieldType, label: &str) -> Self {
        Self {
            key: key.to_string(),
            field_type,
            label: label.to_string(),
            description: None,
            default_value: None,
            params: FieldParams::default(),
            condition: None,
        }
    }

    pub fn text(key: &str, label: &str) -> Self {
        Self::new(key, FieldType::Text, label)
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.params.required = Some(true);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn range(mut self, min: u32, max: u32) -> Self {
        self.params.min = Some(min);
        self.params.max = Some(max);
        self
    }

    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.params.options = options;
        self
    }

    pub fn when(mut self, key: &str, value: &str) -> Self {
        self.condition = Some(Condition {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn is_required(&self) -> bool {
        self.params.required.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub key: String,
    pub label: String,
    pub default_collapsed: bool,
    pub fields: Vec<String>,
}

impl Section {
    pub fn collapsed(key: &str, label: &str, fields: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            default_collapsed: true,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormEntry {
    Field { key: String },
    Section { key: String },
}

impl FormEntry {
    pub fn field(key: &str) -> Self {
        FormEntry::Field { key: key.to_string() }
    }

    pub fn section(key: &str) -> Self {
        FormEntry::Section { key: key.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub key: String,
    #[serde(rename = "type")]
    pub preview_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    pub children: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    #[serde(rename = "type")]
    pub node_type: String,
    pub default_label: String,
    pub preview: Preview,
    pub fields: Vec<FieldDescriptor>,
    pub sections: Vec<Section>,
    pub form: Vec<FormEntry>,
    pub appearance: Appearance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}

impl NodeDescriptor {
    /// Every Airtable node previews its table name and uses the brand colour.
    pub fn new(node_type: &str, default_label: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            default_label: default_label.to_string(),
            preview: Preview {
                key: "tableName".to_string(),
                preview_type: "text".to_string(),
            },
            fields: vec![],
            sections: vec![],
            form: vec![],
            appearance: Appearance {
                color: NODE_COLOR.to_string(),
                text_color: None,
                variant: None,
            },
            dependencies: None,
        }
    }

    pub fn fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    pub fn sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    pub fn form(mut self, form: Vec<FormEntry>) -> Self {
        self.form = form;
        self
    }

    pub fn children(mut self, children: &[Branch]) -> Self {
        self.dependencies = Some(Dependencies {
            children: children.to_vec(),
        });
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn child_branches(&self) -> &[Branch] {
        self.dependencies
            .as_ref()
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    /// Cross-checks form, sections and conditions against the declared fields.
    pub fn validate(&self) -> Result<(), String> {
        let mut keys = HashSet::new();
        for field in &self.fields {
            if !keys.insert(field.key.as_str()) {
                return Err(format!("{}: duplicate field {}", self.node_type, field.key));
            }
        }

        let section_keys: HashSet<&str> = self.sections.iter().map(|s| s.key.as_str()).collect();
        for section in &self.sections {
            if let Some(missing) = section.fields.iter().find(|f| !keys.contains(f.as_str())) {
                return Err(format!("{}: section {} lists unknown field {}", self.node_type, section.key, missing));
            }
        }

        for entry in &self.form {
            let ok = match entry {
                FormEntry::Field { key } => keys.contains(key.as_str()),
                FormEntry::Section { key } => section_keys.contains(key.as_str()),
            };
            if !ok {
                return Err(format!("{}: form refers to unknown entry {:?}", self.node_type, entry));
            }
        }

        for field in &self.fields {
            if let Some(condition) = &field.condition {
                if !keys.contains(condition.key.as_str()) {
                    return Err(format!("{}: {} depends on unknown field {}", self.node_type, field.key, condition.key));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predecessor {
    pub whitelist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub predecessor: Predecessor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraints {
    pub editable: bool,
    pub deletable: bool,
    pub collapsable: bool,
    pub creatable: bool,
    pub movable: bool,
    pub placement: Placement,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            editable: false,
            deletable: true,
            collapsable: true,
            creatable: true,
            movable: false,
            placement: Placement {
                predecessor: Predecessor { whitelist: vec![] },
            },
        }
    }
}

/// The small labelled nodes hanging off a branching node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildNodeDescriptor {
    #[serde(rename = "type")]
    pub branch: Branch,
    pub parent_type: String,
    pub default_label: String,
    pub appearance: Appearance,
    pub constraints: Constraints,
}

impl ChildNodeDescriptor {
    pub fn new(branch: Branch, parent_type: &str) -> Self {
        let (label, color) = match branch {
            Branch::Success => ("Success", "#2ecc71"),
            Branch::NotFound => ("Not Found", "#f39c12"),
            Branch::MultipleFound => ("Multiple Found", "#9b59b6"),
            Branch::Error => ("Error", "#e74c3c"),
        };

        Self {
            branch,
            parent_type: parent_type.to_string(),
            default_label: label.to_string(),
            appearance: Appearance {
                color: color.to_string(),
                text_color: Some("white".to_string()),
                variant: Some("mini".to_string()),
            },
            constraints: Constraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionField {
    pub field_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSchema {
    #[serde(rename = "type")]
    pub connection_type: String,
    pub label: String,
    pub fields: Vec<ConnectionField>,
}

pub fn airtable_connection() -> ConnectionSchema {
    ConnectionSchema {
        connection_type: CONNECTION_TYPE.to_string(),
        label: "Airtable Personal Access Token Connection".to_string(),
        fields: vec![ConnectionField {
            field_name: "accessToken".to_string(),
        }],
    }
}

// Fields shared by every node.

pub fn connection_field() -> FieldDescriptor {
    let mut field = FieldDescriptor::new("connection", FieldType::Connection, "Airtable Connection").required();
    field.params.connection_type = Some(CONNECTION_TYPE.to_string());
    field
}

pub fn base_id_field() -> FieldDescriptor {
    FieldDescriptor::text("baseId", "Base ID")
        .description("The Airtable base ID (found in the URL: app...)")
        .required()
}

pub fn table_name_field(description: &str) -> FieldDescriptor {
    FieldDescriptor::text("tableName", "Table Name")
        .description(description)
        .required()
}

pub fn projection_field() -> FieldDescriptor {
    FieldDescriptor::new("fields", FieldType::TextArray, "Fields to Retrieve")
        .description("Specific fields to return (leave empty for all fields)")
        .default_value(Value::Array(vec![]))
}

pub fn storage_fields(default_key: &str) -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("storeLocation", FieldType::Select, "Where to store the result")
            .options(vec![
                SelectOption::new("Input", "input"),
                SelectOption::new("Context", "context"),
            ])
            .required()
            .default_value(Value::from("context")),
        FieldDescriptor::text("inputKey", "Input Key to store Result")
            .default_value(Value::from(default_key))
            .when("storeLocation", "input"),
        FieldDescriptor::text("contextKey", "Context Key to store Result")
            .default_value(Value::from(default_key))
            .when("storeLocation", "context"),
    ]
}

pub fn storage_section() -> Section {
    Section::collapsed("storageOption", "Storage Option", &["storeLocation", "inputKey", "contextKey"])
}
