//! Schema catalog
//!
//! Static descriptors of the two content types the recorder needs on the
//! remote store: the application container and the measurement record. The
//! descriptors render the definition document uploaded by the provisioner and
//! tell where the installed type lives in the schema tree.

use crate::core::path;
use std::fmt;

pub const FOLDER_TYPE_NAME: &str = "Folder";
pub const GENERIC_CONTENT_TYPE_NAME: &str = "GenericContent";

pub const CONTAINER_TYPE_NAME: &str = "ClientApplicationFolderV0_1";
pub const RECORD_TYPE_NAME: &str = "BloodPressure";

pub const APP_NAME_FIELD: &str = "AppName";
pub const APP_INFO_FIELD: &str = "AppInfo";

pub const RECORDED_FIELD: &str = "Recorded";
pub const SYSTOLIC_FIELD: &str = "Syst";
pub const DIASTOLIC_FIELD: &str = "Dias";
pub const PULSE_FIELD: &str = "Puls";

const DEFINITION_NAMESPACE: &str =
    "http://schemas.sensenet.com/SenseNet/ContentRepository/ContentTypeDefinition";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    ShortText,
    DateTime,
    Integer,
}

impl FieldType {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ShortText => "ShortText",
            Self::DateTime => "DateTime",
            Self::Integer => "Integer",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub field_type: FieldType,
}

/// Immutable description of one content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub type_name: &'static str,
    pub parent_type_name: &'static str,
    pub handler: &'static str,
    pub icon: &'static str,
    /// Type names between `GenericContent` and this type, outermost first.
    pub ancestry: &'static [&'static str],
    pub fields: &'static [FieldDefinition],
}

pub static CONTAINER_SCHEMA: SchemaDefinition = SchemaDefinition {
    type_name: CONTAINER_TYPE_NAME,
    parent_type_name: FOLDER_TYPE_NAME,
    handler: "SenseNet.ContentRepository.Folder",
    icon: "Application",
    ancestry: &[FOLDER_TYPE_NAME],
    fields: &[
        FieldDefinition {
            name: APP_NAME_FIELD,
            field_type: FieldType::ShortText,
        },
        FieldDefinition {
            name: APP_INFO_FIELD,
            field_type: FieldType::ShortText,
        },
    ],
};

pub static RECORD_SCHEMA: SchemaDefinition = SchemaDefinition {
    type_name: RECORD_TYPE_NAME,
    parent_type_name: GENERIC_CONTENT_TYPE_NAME,
    handler: "SenseNet.ContentRepository.GenericContent",
    icon: "File",
    ancestry: &[],
    fields: &[
        FieldDefinition {
            name: RECORDED_FIELD,
            field_type: FieldType::DateTime,
        },
        FieldDefinition {
            name: SYSTOLIC_FIELD,
            field_type: FieldType::Integer,
        },
        FieldDefinition {
            name: DIASTOLIC_FIELD,
            field_type: FieldType::Integer,
        },
        FieldDefinition {
            name: PULSE_FIELD,
            field_type: FieldType::Integer,
        },
    ],
};

impl SchemaDefinition {
    pub fn display_name(&self) -> &'static str {
        self.type_name
    }

    /// Path of the installed type, e.g.
    /// `<schema_root>/Folder/ClientApplicationFolderV0_1`.
    pub fn schema_path(&self, schema_root: &str) -> String {
        path::join(&self.upload_target(schema_root), self.type_name)
    }

    /// Folder the definition document is uploaded into.
    pub fn upload_target(&self, schema_root: &str) -> String {
        self.ancestry
            .iter()
            .fold(schema_root.to_string(), |parent, segment| {
                path::join(&parent, segment)
            })
    }

    /// Renders the content type definition document.
    pub fn to_document(&self) -> String {
        let mut doc = String::with_capacity(256 + self.fields.len() * 96);
        doc.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        doc.push_str(&format!(
            "<ContentType name=\"{}\" parentType=\"{}\" handler=\"{}\" xmlns=\"{}\">\n",
            escape_xml(self.type_name),
            escape_xml(self.parent_type_name),
            escape_xml(self.handler),
            DEFINITION_NAMESPACE
        ));
        doc.push_str(&format!(
            "  <DisplayName>{}</DisplayName>\n",
            escape_xml(self.display_name())
        ));
        doc.push_str(&format!("  <Icon>{}</Icon>\n", escape_xml(self.icon)));
        doc.push_str("  <Fields>\n");
        for field in self.fields {
            doc.push_str(&format!(
                "    <Field name=\"{}\" type=\"{}\">\n",
                escape_xml(field.name),
                field.field_type
            ));
            doc.push_str(&format!(
                "      <DisplayName>{}</DisplayName>\n",
                escape_xml(field.name)
            ));
            doc.push_str("    </Field>\n");
        }
        doc.push_str("  </Fields>\n");
        doc.push_str("</ContentType>\n");
        doc
    }
}

/// The schema objects this application installs, in installation order.
#[derive(Debug, Clone, Copy)]
pub struct SchemaCatalog {
    pub container: &'static SchemaDefinition,
    pub record: &'static SchemaDefinition,
}

impl SchemaCatalog {
    pub fn standard() -> Self {
        Self {
            container: &CONTAINER_SCHEMA,
            record: &RECORD_SCHEMA,
        }
    }

    pub fn definitions(&self) -> [&'static SchemaDefinition; 2] {
        [self.container, self.record]
    }

    /// Type names granted as allowed children on the workspace root.
    pub fn granted_type_names(&self) -> Vec<&'static str> {
        vec![self.container.type_name, self.record.type_name]
    }

    /// Child types the application container accepts.
    pub fn container_child_types(&self) -> Vec<&'static str> {
        vec![FOLDER_TYPE_NAME, self.record.type_name]
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
