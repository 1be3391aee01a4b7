use crate::domain::ports::GraphSink;
use crate::utils::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// What happens to a resource's data when it is removed from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Delete,
    Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties", skip_serializing_if = "Map::is_empty", default)]
    pub properties: Map<String, Value>,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none", default)]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none", default)]
    pub update_replace_policy: Option<RemovalPolicy>,
}

impl Resource {
    /// `properties` must be a JSON object. Debug builds panic on anything
    /// else; release builds emit the resource without properties.
    pub fn new(resource_type: &str, properties: Value) -> Self {
        debug_assert!(
            properties.is_object(),
            "properties of {} must be a JSON object",
            resource_type
        );
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRef {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none", default)]
    pub export: Option<ExportRef>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            description: None,
            value,
            export: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn exported_as(mut self, name: String) -> Self {
        self.export = Some(ExportRef { name });
        self
    }
}

/// In-memory resource graph for one stack, serialised as a CloudFormation template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, Output>,
    #[serde(skip)]
    pub stack_name: String,
}

impl StackTemplate {
    pub fn new(stack_name: &str, description: &str) -> Self {
        Self {
            format_version: "2010-09-09".to_string(),
            description: description.to_string(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            stack_name: stack_name.to_string(),
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Export names this stack publishes.
    pub fn exports(&self) -> BTreeSet<String> {
        self.outputs
            .values()
            .filter_map(|o| o.export.as_ref().map(|e| e.name.clone()))
            .collect()
    }

    /// Export names this stack consumes through `Fn::ImportValue`.
    pub fn imports(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for resource in self.resources.values() {
            for value in resource.properties.values() {
                collect_imports(value, &mut found);
            }
        }
        for output in self.outputs.values() {
            collect_imports(&output.value, &mut found);
        }
        found
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn collect_imports(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Fn::ImportValue") {
                found.insert(name.clone());
            }
            for v in map.values() {
                collect_imports(v, found);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_imports(v, found)),
        _ => {}
    }
}

impl GraphSink for StackTemplate {
    fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<()> {
        if self.resources.contains_key(logical_id) {
            return Err(StackError::DuplicateLogicalId {
                stack: self.stack_name.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    fn add_output(&mut self, logical_id: &str, output: Output) -> Result<()> {
        if self.outputs.contains_key(logical_id) {
            return Err(StackError::DuplicateLogicalId {
                stack: self.stack_name.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        if let Some(export) = &output.export {
            if self.exports().contains(&export.name) {
                return Err(StackError::DuplicateExport {
                    stack: self.stack_name.clone(),
                    name: export.name.clone(),
                });
            }
        }
        self.outputs.insert(logical_id.to_string(), output);
        Ok(())
    }
}

/// CloudFormation intrinsic functions.
pub mod intrinsic {
    use super::*;

    pub fn reference(logical_id: &str) -> Value {
        json!({ "Ref": logical_id })
    }

    pub fn get_att(logical_id: &str, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [logical_id, attribute] })
    }

    pub fn import_value(export_name: &str) -> Value {
        json!({ "Fn::ImportValue": export_name })
    }

    pub fn sub(template: &str) -> Value {
        json!({ "Fn::Sub": template })
    }

    pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
        json!({ "Fn::Join": [delimiter, parts] })
    }

    pub fn select(index: usize, list: Value) -> Value {
        json!({ "Fn::Select": [index.to_string(), list] })
    }

    pub fn split(delimiter: &str, source: Value) -> Value {
        json!({ "Fn::Split": [delimiter, source] })
    }

    pub fn azs() -> Value {
        json!({ "Fn::GetAZs": "" })
    }

    /// Bucket name from an `arn:aws:s3:::<name>` value that is only known at apply time.
    pub fn bucket_name_from_arn(arn: Value) -> Value {
        select(5, split(":", arn))
    }
}
