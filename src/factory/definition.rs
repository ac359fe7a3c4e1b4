//! JSON block definitions.
//!
//! A definition looks like:
//!
//! ```json
//! {
//!   "type": "math_arithmetic",
//!   "message0": "%1 %2 %3",
//!   "args0": [
//!     {"type": "input_value", "name": "A", "check": "Number"},
//!     {"type": "field_dropdown", "name": "OP", "options": [["+", "ADD"], ["-", "MINUS"]]},
//!     {"type": "input_value", "name": "B", "check": "Number"}
//!   ],
//!   "output": "Number",
//!   "inputsInline": true
//! }
//! ```
//!
//! `output`, `previousStatement` and `nextStatement` create the connection
//! when the key is present; the value (null, a string or an array of
//! strings) becomes its type checks.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DefinitionError;
use crate::model::{Block, DropdownOption, Field, FieldValue, Input, InputKind};

/// One token of a message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageToken {
    Text(String),
    /// A `%N` placeholder; `N` is 1-based as written.
    Arg(usize),
}

/// Split a message into text and `%N` placeholders.
///
/// `%` followed by digits is a placeholder, numbered from 1. `%%` is an
/// escaped literal `%`. Any other `%`, including `%0`, is kept as literal
/// text. Adjacent text is merged, so
/// two `Text` tokens never follow each other.
pub fn tokenize_message(message: &str) -> Vec<MessageToken> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut chars = message.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            text.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                text.push('%');
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                match digits.parse::<usize>() {
                    Ok(n) if n > 0 => {
                        if !text.is_empty() {
                            tokens.push(MessageToken::Text(std::mem::take(&mut text)));
                        }
                        tokens.push(MessageToken::Arg(n));
                    }
                    // `%0` or too many digits to be an index: keep it as text.
                    _ => {
                        text.push('%');
                        text.push_str(&digits);
                    }
                }
            }
            _ => text.push('%'),
        }
    }
    if !text.is_empty() {
        tokens.push(MessageToken::Text(text));
    }
    tokens
}

/// A parsed block type: its metadata and a prototype block that instances
/// are copied from.
#[derive(Debug, Clone)]
pub struct BlockDefinition {
    block_type: String,
    colour: Option<String>,
    tooltip: Option<String>,
    help_url: Option<String>,
    prototype: Block,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArgJson {
    #[serde(rename = "type")]
    arg_type: String,
    name: Option<String>,
    check: Option<Value>,
    text: Option<String>,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    precision: Option<f64>,
    angle: Option<f64>,
    checked: Option<bool>,
    colour: Option<String>,
    date: Option<String>,
    options: Option<Vec<(Value, String)>>,
    variable: Option<String>,
    src: Option<String>,
    width: Option<f32>,
    height: Option<f32>,
    /// Image alt text, or a fallback argument for unknown types.
    alt: Option<Value>,
}

/// A resolved `argsN` entry.
enum Arg {
    Field(Field),
    Input(Input),
}

impl BlockDefinition {
    /// Parse one definition object.
    pub fn from_json(value: &Value) -> Result<Self, DefinitionError> {
        let obj = value
            .as_object()
            .ok_or_else(|| DefinitionError::Json("block definition must be an object".into()))?;
        let block_type = obj
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(DefinitionError::MissingType)?
            .to_string();
        let invalid = |message: String| DefinitionError::Invalid {
            block_type: block_type.clone(),
            message,
        };

        let mut prototype = Block::new("", block_type.as_str());
        if obj.contains_key("output") && obj.contains_key("previousStatement") {
            return Err(invalid(
                "a block cannot have both an output and a previous connection".into(),
            ));
        }
        if let Some(v) = obj.get("output") {
            prototype = prototype.with_output(parse_checks(v).map_err(&invalid)?);
        }
        if let Some(v) = obj.get("previousStatement") {
            prototype = prototype.with_previous(parse_checks(v).map_err(&invalid)?);
        }
        if let Some(v) = obj.get("nextStatement") {
            prototype = prototype.with_next(parse_checks(v).map_err(&invalid)?);
        }
        prototype.inputs_inline = obj.get("inputsInline").and_then(Value::as_bool);

        for input in parse_inputs(obj).map_err(&invalid)? {
            if prototype.input(input.name()).is_some() && !input.name().is_empty() {
                return Err(invalid(format!("duplicate input name '{}'", input.name())));
            }
            prototype = prototype.with_input(input);
        }

        let colour = obj.get("colour").and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Ok(Self {
            colour,
            tooltip: obj.get("tooltip").and_then(Value::as_str).map(str::to_string),
            help_url: obj.get("helpUrl").and_then(Value::as_str).map(str::to_string),
            block_type,
            prototype,
        })
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn colour(&self) -> Option<&str> {
        self.colour.as_deref()
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn help_url(&self) -> Option<&str> {
        self.help_url.as_deref()
    }

    /// The template block. Its id is empty.
    pub fn prototype(&self) -> &Block {
        &self.prototype
    }

    /// A fresh, unconnected block of this type.
    pub fn instantiate(&self, id: String) -> Block {
        self.prototype.detached_copy(id)
    }
}

/// Parse a JSON document holding one definition or an array of them.
pub fn parse_definitions(json: &str) -> Result<Vec<BlockDefinition>, DefinitionError> {
    let value: Value = serde_json::from_str(json).map_err(|e| DefinitionError::Json(e.to_string()))?;
    match &value {
        Value::Array(items) => items.iter().map(BlockDefinition::from_json).collect(),
        _ => Ok(vec![BlockDefinition::from_json(&value)?]),
    }
}

fn parse_checks(value: &Value) -> Result<Option<Vec<String>>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(vec![s.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("check entries must be strings, found {}", item))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        other => Err(format!("invalid check value {}", other)),
    }
}

/// Walk `message0`/`args0`, `message1`/`args1`, ... and build the inputs.
fn parse_inputs(obj: &Map<String, Value>) -> Result<Vec<Input>, String> {
    let mut inputs = Vec::new();
    let mut index = 0;
    while let Some(message) = obj.get(&format!("message{}", index)) {
        let message = message
            .as_str()
            .ok_or_else(|| format!("message{} must be a string", index))?;
        let args: Vec<ArgJson> = match obj.get(&format!("args{}", index)) {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| format!("args{}: {}", index, e))?,
            None => Vec::new(),
        };
        interpolate(message, args, index, &mut inputs)?;
        index += 1;
    }
    Ok(inputs)
}

fn interpolate(
    message: &str,
    args: Vec<ArgJson>,
    index: usize,
    inputs: &mut Vec<Input>,
) -> Result<(), String> {
    let mut resolved: Vec<Option<Arg>> = args
        .into_iter()
        .map(|a| resolve_arg(a).map(Some))
        .collect::<Result<_, _>>()?;
    let mut pending: Vec<Field> = Vec::new();
    for token in tokenize_message(message) {
        match token {
            MessageToken::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pending.push(Field::new(
                        "",
                        FieldValue::Label {
                            text: trimmed.to_string(),
                        },
                    ));
                }
            }
            MessageToken::Arg(n) => {
                let slot = n
                    .checked_sub(1)
                    .and_then(|i| resolved.get_mut(i))
                    .ok_or_else(|| format!("message{} references missing argument %{}", index, n))?;
                match slot.take() {
                    None => {
                        return Err(format!("message{} uses argument %{} twice", index, n));
                    }
                    Some(Arg::Field(field)) => pending.push(field),
                    Some(Arg::Input(input)) => {
                        let fields = std::mem::take(&mut pending);
                        inputs.push(input.with_fields(fields));
                    }
                }
            }
        }
    }
    if let Some(unused) = resolved.iter().position(Option::is_some) {
        return Err(format!("args{} entry {} is never referenced", index, unused + 1));
    }
    if !pending.is_empty() {
        inputs.push(Input::new("", InputKind::Dummy, None).with_fields(pending));
    }
    Ok(())
}

fn resolve_arg(arg: ArgJson) -> Result<Arg, String> {
    let name = arg.name.clone().unwrap_or_default();
    let value = match arg.arg_type.as_str() {
        "input_value" | "input_statement" | "input_dummy" => {
            let kind = match arg.arg_type.as_str() {
                "input_value" => InputKind::Value,
                "input_statement" => InputKind::Statement,
                _ => InputKind::Dummy,
            };
            if kind != InputKind::Dummy && name.is_empty() {
                return Err(format!("{} requires a name", arg.arg_type));
            }
            let checks = match &arg.check {
                Some(v) => parse_checks(v)?,
                None => None,
            };
            return Ok(Arg::Input(Input::new(name, kind, checks)));
        }
        "field_label" => FieldValue::Label {
            text: arg.text.unwrap_or_default(),
        },
        "field_input" => FieldValue::Text {
            text: arg.text.unwrap_or_default(),
        },
        "field_checkbox" => FieldValue::Checkbox {
            checked: arg.checked.unwrap_or(false),
        },
        "field_number" => FieldValue::Number {
            value: arg.value.unwrap_or(0.0),
            min: arg.min,
            max: arg.max,
            precision: arg.precision,
        },
        "field_angle" => FieldValue::Angle {
            degrees: crate::model::field::normalize_angle(arg.angle.unwrap_or(0.0)),
        },
        "field_colour" => {
            let mut field = Field::new(name.as_str(), FieldValue::Colour { rgb: "#ff0000".into() });
            if let Some(colour) = &arg.colour {
                if !field.set_from_string(colour) {
                    return Err(format!("invalid colour '{}'", colour));
                }
            }
            return Ok(Arg::Field(field));
        }
        "field_date" => {
            let date = match &arg.date {
                Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|_| format!("invalid date '{}'", text))?,
                None => chrono::Local::now().date_naive(),
            };
            FieldValue::Date { date }
        }
        "field_dropdown" => {
            let options: Vec<DropdownOption> = arg
                .options
                .unwrap_or_default()
                .into_iter()
                .map(|(display, value)| DropdownOption {
                    display: match display {
                        Value::String(s) => s,
                        // Image options show their alt text.
                        Value::Object(o) => o
                            .get("alt")
                            .and_then(Value::as_str)
                            .unwrap_or(&value)
                            .to_string(),
                        other => other.to_string(),
                    },
                    value,
                })
                .collect();
            if options.is_empty() {
                return Err(format!("dropdown '{}' has no options", name));
            }
            FieldValue::Dropdown {
                options,
                selected: 0,
            }
        }
        "field_variable" => FieldValue::Variable {
            name: Some(arg.variable.clone().unwrap_or_else(|| "item".to_string())),
        },
        "field_image" => FieldValue::Image {
            src: arg.src.unwrap_or_default(),
            width: arg.width.unwrap_or(0.0),
            height: arg.height.unwrap_or(0.0),
            alt: arg
                .alt
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        other => {
            return match arg.alt {
                Some(alt @ Value::Object(_)) => {
                    let fallback: ArgJson =
                        serde_json::from_value(alt).map_err(|e| format!("alt of '{}': {}", other, e))?;
                    resolve_arg(fallback)
                }
                _ => Err(format!("unknown argument type '{}'", other)),
            };
        }
    };
    Ok(Arg::Field(Field::new(name, value)))
}
