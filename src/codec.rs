//! HCL codec
//!
//! Renders resource data as `resource "<type>" "<label>" { ... }` blocks and
//! reads such blocks back from `.tf` text.
//!
//! Rendering rules: a map becomes a nested block, a non-empty list of maps
//! becomes repeated blocks, nulls are dropped, and everything else is an
//! attribute. Parsing applies the reverse, always producing block lists.

use crate::resource::ResourceData;
use anyhow::{bail, Context, Result};
use hcl::expr::{Expression, ObjectKey, TemplateExpr};
use hcl::{Attribute, Block, Body, Structure};
use serde_json::{Map, Value};
use std::io::Write;

/// A `resource` block read from HCL text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResource {
    pub res_type: String,
    pub label: String,
    pub data: ResourceData,
}

/// Write `data` as one resource block, preceded by `comments` as `#` lines
pub fn export<W: Write>(
    data: &ResourceData,
    writer: &mut W,
    res_type: &str,
    label: &str,
    comments: &[String],
) -> Result<()> {
    for comment in comments {
        writeln!(writer, "# {}", comment)?;
    }

    let body = Body::builder()
        .add_block(resource_block(data, res_type, label))
        .build();
    let text = hcl::to_string(&body)
        .with_context(|| format!("Failed to serialize {} \"{}\"", res_type, label))?;

    writer.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(writer)?;
    }
    Ok(())
}

/// Render `data` as a resource block string
pub fn to_hcl_string(data: &ResourceData, res_type: &str, label: &str) -> Result<String> {
    let mut out = Vec::new();
    export(data, &mut out, res_type, label, &[])?;
    String::from_utf8(out).context("HCL output is not valid UTF-8")
}

/// Read every `resource` block of `text`
pub fn parse_resources(text: &str) -> Result<Vec<ParsedResource>> {
    let body: Body = hcl::from_str(text).context("Failed to parse HCL")?;

    let mut resources = Vec::new();
    for structure in body.iter() {
        let Structure::Block(block) = structure else {
            continue;
        };
        if block.identifier() != "resource" {
            continue;
        }

        let labels = block.labels();
        if labels.len() != 2 {
            bail!(
                "resource block needs a type and a name label, got {}",
                labels.len()
            );
        }
        let res_type = labels[0].as_str().to_string();
        let label = labels[1].as_str().to_string();

        let attributes = body_to_map(block.body())
            .with_context(|| format!("in resource {}.{}", res_type, label))?;
        resources.push(ParsedResource {
            res_type,
            label,
            data: ResourceData::from_attributes(attributes),
        });
    }

    Ok(resources)
}

fn resource_block(data: &ResourceData, res_type: &str, label: &str) -> Block {
    let builder = Block::builder("resource").add_label(res_type).add_label(label);
    append_body(builder, data.attributes()).build()
}

fn append_body(
    mut builder: hcl::structure::BlockBuilder,
    map: &Map<String, Value>,
) -> hcl::structure::BlockBuilder {
    // Attributes first, then nested blocks
    for (key, value) in map {
        if value.is_null() || is_block_value(value) {
            continue;
        }
        builder = builder.add_attribute(Attribute::new(key.as_str(), to_expression(value)));
    }

    for (key, value) in map {
        match value {
            Value::Object(nested) => {
                builder = builder.add_block(nested_block(key, nested));
            }
            Value::Array(items) if is_block_value(value) => {
                for item in items.iter().filter_map(|v| v.as_object()) {
                    builder = builder.add_block(nested_block(key, item));
                }
            }
            _ => {}
        }
    }

    builder
}

fn nested_block(identifier: &str, map: &Map<String, Value>) -> Block {
    append_body(Block::builder(identifier), map).build()
}

fn is_block_value(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(|v| v.is_object()),
        _ => false,
    }
}

fn to_expression(value: &Value) -> Expression {
    match value {
        Value::Null => Expression::Null,
        Value::Bool(b) => Expression::Bool(*b),
        Value::Number(n) => number_expression(n),
        Value::String(s) => Expression::String(s.clone()),
        Value::Array(items) => Expression::Array(items.iter().map(to_expression).collect()),
        Value::Object(map) => Expression::Object(
            map.iter()
                .map(|(k, v)| {
                    (
                        ObjectKey::Expression(Expression::String(k.clone())),
                        to_expression(v),
                    )
                })
                .collect(),
        ),
    }
}

fn number_expression(n: &serde_json::Number) -> Expression {
    if let Some(i) = n.as_i64() {
        Expression::Number(hcl::Number::from(i))
    } else if let Some(u) = n.as_u64() {
        Expression::Number(hcl::Number::from(u))
    } else {
        n.as_f64()
            .and_then(hcl::Number::from_f64)
            .map(Expression::Number)
            .unwrap_or(Expression::Null)
    }
}

fn body_to_map(body: &Body) -> Result<Map<String, Value>> {
    let mut map = Map::new();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => {
                let value = from_expression(attr.expr())
                    .with_context(|| format!("attribute \"{}\"", attr.key()))?;
                map.insert(attr.key().to_string(), value);
            }
            Structure::Block(block) => {
                let nested = body_to_map(block.body())?;
                let entry = map
                    .entry(block.identifier().to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(items) => items.push(Value::Object(nested)),
                    _ => bail!("\"{}\" is both an attribute and a block", block.identifier()),
                }
            }
        }
    }

    Ok(map)
}

fn from_expression(expr: &Expression) -> Result<Value> {
    let value = match expr {
        Expression::Null => Value::Null,
        Expression::Bool(b) => Value::Bool(*b),
        Expression::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Expression::String(s) => Value::String(s.clone()),
        Expression::Array(items) => {
            Value::Array(items.iter().map(from_expression).collect::<Result<_>>()?)
        }
        Expression::Object(object) => {
            let mut map = Map::new();
            for (key, value) in object.iter() {
                let key = match key {
                    ObjectKey::Identifier(ident) => ident.to_string(),
                    ObjectKey::Expression(Expression::String(s)) => s.clone(),
                    _ => bail!("unsupported object key"),
                };
                map.insert(key, from_expression(value)?);
            }
            Value::Object(map)
        }
        Expression::TemplateExpr(template) => match template.as_ref() {
            TemplateExpr::QuotedString(s) => Value::String(s.clone()),
            TemplateExpr::Heredoc(heredoc) => Value::String(heredoc.template.clone()),
        },
        _ => bail!("only literal values are supported"),
    };

    Ok(value)
}
