// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::{Map, Value};

use crate::policy::ParamSpec;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),
    #[error("parameter '{name}' must be {expected}, got {found}")]
    WrongType { name: String, expected: String, found: &'static str },
    #[error("unexpected parameter '{name}' (accepted: {accepted})")]
    UnexpectedParameter { name: String, accepted: String },
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `raw` against a tool's parameter list and return the argument map.
///
/// `null` means "no arguments".  A bare non-object value is accepted when the
/// tool declares exactly one parameter and is bound to that parameter.
/// A key listed in a parameter's aliases is renamed to the parameter unless
/// the parameter itself is present.  Values are passed through unchanged.
pub fn validate_args(params: &[ParamSpec], raw: Value) -> Result<Map<String, Value>, ArgError> {
    let mut args = match raw {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => match params {
            [only] => {
                let mut map = Map::new();
                map.insert(only.name.to_string(), other);
                map
            }
            _ => return Err(ArgError::NotAnObject(kind_of(&other))),
        },
    };

    for p in params {
        if args.contains_key(p.name) {
            continue;
        }
        if let Some(alias) = p.aliases.iter().find(|a| args.contains_key(**a)) {
            if let Some(v) = args.remove(*alias) {
                args.insert(p.name.to_string(), v);
            }
        }
    }

    for key in args.keys() {
        if !params.iter().any(|p| p.name == key) {
            let accepted: Vec<&str> = params.iter().map(|p| p.name).collect();
            return Err(ArgError::UnexpectedParameter {
                name: key.clone(),
                accepted: if accepted.is_empty() { "none".into() } else { accepted.join(", ") },
            });
        }
    }

    for p in params {
        match args.get(p.name) {
            None | Some(Value::Null) if p.required => {
                return Err(ArgError::MissingParameter(p.name.to_string()));
            }
            Some(v) if !v.is_null() && !p.ty.accepts(v) => {
                return Err(ArgError::WrongType {
                    name: p.name.to_string(),
                    expected: p.ty.to_string(),
                    found: kind_of(v),
                });
            }
            _ => {}
        }
    }

    Ok(args)
}
