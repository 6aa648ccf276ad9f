//! WAMP v2 messages and their JSON array encoding
//!
//! Only the messages a callee/subscriber/publisher client needs are
//! modeled. Every message is a JSON array whose first element is the
//! message code.

use crate::error::ProtocolError;
use serde_json::{json, Value};

/// WAMP dictionary (details, options, keyword arguments)
pub type Dict = serde_json::Map<String, Value>;

/// Positional and keyword arguments carried by a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub args: Vec<Value>,
    pub kwargs: Dict,
}

impl Payload {
    pub fn new(args: Vec<Value>, kwargs: Dict) -> Self {
        Self { args, kwargs }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// First positional argument, if any
    pub fn first(&self) -> Option<&Value> {
        self.args.first()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

impl From<Value> for Payload {
    /// A single value becomes the only positional argument
    fn from(value: Value) -> Self {
        Self {
            args: vec![value],
            kwargs: Dict::new(),
        }
    }
}

/// Message type codes
pub mod code {
    pub const HELLO: u64 = 1;
    pub const WELCOME: u64 = 2;
    pub const ABORT: u64 = 3;
    pub const CHALLENGE: u64 = 4;
    pub const AUTHENTICATE: u64 = 5;
    pub const GOODBYE: u64 = 6;
    pub const ERROR: u64 = 8;
    pub const PUBLISH: u64 = 16;
    pub const PUBLISHED: u64 = 17;
    pub const SUBSCRIBE: u64 = 32;
    pub const SUBSCRIBED: u64 = 33;
    pub const EVENT: u64 = 36;
    pub const REGISTER: u64 = 64;
    pub const REGISTERED: u64 = 65;
    pub const INVOCATION: u64 = 68;
    pub const YIELD: u64 = 70;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WampMessage {
    Hello {
        realm: String,
        details: Dict,
    },
    Welcome {
        session: u64,
        details: Dict,
    },
    Abort {
        details: Dict,
        reason: String,
    },
    Challenge {
        method: String,
        extra: Dict,
    },
    Authenticate {
        signature: String,
        extra: Dict,
    },
    Goodbye {
        details: Dict,
        reason: String,
    },
    Error {
        request_type: u64,
        request: u64,
        details: Dict,
        error: String,
        payload: Payload,
    },
    Publish {
        request: u64,
        options: Dict,
        topic: String,
        payload: Payload,
    },
    Published {
        request: u64,
        publication: u64,
    },
    Subscribe {
        request: u64,
        options: Dict,
        topic: String,
    },
    Subscribed {
        request: u64,
        subscription: u64,
    },
    Event {
        subscription: u64,
        publication: u64,
        details: Dict,
        payload: Payload,
    },
    Register {
        request: u64,
        options: Dict,
        procedure: String,
    },
    Registered {
        request: u64,
        registration: u64,
    },
    Invocation {
        request: u64,
        registration: u64,
        details: Dict,
        payload: Payload,
    },
    Yield {
        request: u64,
        options: Dict,
        payload: Payload,
    },
}

impl WampMessage {
    pub fn code(&self) -> u64 {
        match self {
            WampMessage::Hello { .. } => code::HELLO,
            WampMessage::Welcome { .. } => code::WELCOME,
            WampMessage::Abort { .. } => code::ABORT,
            WampMessage::Challenge { .. } => code::CHALLENGE,
            WampMessage::Authenticate { .. } => code::AUTHENTICATE,
            WampMessage::Goodbye { .. } => code::GOODBYE,
            WampMessage::Error { .. } => code::ERROR,
            WampMessage::Publish { .. } => code::PUBLISH,
            WampMessage::Published { .. } => code::PUBLISHED,
            WampMessage::Subscribe { .. } => code::SUBSCRIBE,
            WampMessage::Subscribed { .. } => code::SUBSCRIBED,
            WampMessage::Event { .. } => code::EVENT,
            WampMessage::Register { .. } => code::REGISTER,
            WampMessage::Registered { .. } => code::REGISTERED,
            WampMessage::Invocation { .. } => code::INVOCATION,
            WampMessage::Yield { .. } => code::YIELD,
        }
    }

    /// Message name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WampMessage::Hello { .. } => "HELLO",
            WampMessage::Welcome { .. } => "WELCOME",
            WampMessage::Abort { .. } => "ABORT",
            WampMessage::Challenge { .. } => "CHALLENGE",
            WampMessage::Authenticate { .. } => "AUTHENTICATE",
            WampMessage::Goodbye { .. } => "GOODBYE",
            WampMessage::Error { .. } => "ERROR",
            WampMessage::Publish { .. } => "PUBLISH",
            WampMessage::Published { .. } => "PUBLISHED",
            WampMessage::Subscribe { .. } => "SUBSCRIBE",
            WampMessage::Subscribed { .. } => "SUBSCRIBED",
            WampMessage::Event { .. } => "EVENT",
            WampMessage::Register { .. } => "REGISTER",
            WampMessage::Registered { .. } => "REGISTERED",
            WampMessage::Invocation { .. } => "INVOCATION",
            WampMessage::Yield { .. } => "YIELD",
        }
    }

    /// Serialize to the `wamp.2.json` wire text
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    fn to_value(&self) -> Value {
        let code = self.code();
        match self {
            WampMessage::Hello { realm, details } => json!([code, realm, details]),
            WampMessage::Welcome { session, details } => json!([code, session, details]),
            WampMessage::Abort { details, reason } => json!([code, details, reason]),
            WampMessage::Challenge { method, extra } => json!([code, method, extra]),
            WampMessage::Authenticate { signature, extra } => json!([code, signature, extra]),
            WampMessage::Goodbye { details, reason } => json!([code, details, reason]),
            WampMessage::Error {
                request_type,
                request,
                details,
                error,
                payload,
            } => with_payload(
                vec![
                    json!(code),
                    json!(request_type),
                    json!(request),
                    json!(details),
                    json!(error),
                ],
                payload,
            ),
            WampMessage::Publish {
                request,
                options,
                topic,
                payload,
            } => with_payload(
                vec![json!(code), json!(request), json!(options), json!(topic)],
                payload,
            ),
            WampMessage::Published {
                request,
                publication,
            } => json!([code, request, publication]),
            WampMessage::Subscribe {
                request,
                options,
                topic,
            } => json!([code, request, options, topic]),
            WampMessage::Subscribed {
                request,
                subscription,
            } => json!([code, request, subscription]),
            WampMessage::Event {
                subscription,
                publication,
                details,
                payload,
            } => with_payload(
                vec![
                    json!(code),
                    json!(subscription),
                    json!(publication),
                    json!(details),
                ],
                payload,
            ),
            WampMessage::Register {
                request,
                options,
                procedure,
            } => json!([code, request, options, procedure]),
            WampMessage::Registered {
                request,
                registration,
            } => json!([code, request, registration]),
            WampMessage::Invocation {
                request,
                registration,
                details,
                payload,
            } => with_payload(
                vec![
                    json!(code),
                    json!(request),
                    json!(registration),
                    json!(details),
                ],
                payload,
            ),
            WampMessage::Yield {
                request,
                options,
                payload,
            } => with_payload(
                vec![json!(code), json!(request), json!(options)],
                payload,
            ),
        }
    }

    /// Parse `wamp.2.json` wire text
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Array(items) = value else {
            return Err(ProtocolError::Malformed("message is not an array".into()));
        };
        let fields = Fields(&items);

        let message = match fields.id(0)? {
            code::HELLO => WampMessage::Hello {
                realm: fields.string(1)?,
                details: fields.dict(2)?,
            },
            code::WELCOME => WampMessage::Welcome {
                session: fields.id(1)?,
                details: fields.dict(2)?,
            },
            code::ABORT => WampMessage::Abort {
                details: fields.dict(1)?,
                reason: fields.string(2)?,
            },
            code::CHALLENGE => WampMessage::Challenge {
                method: fields.string(1)?,
                extra: fields.dict(2)?,
            },
            code::AUTHENTICATE => WampMessage::Authenticate {
                signature: fields.string(1)?,
                extra: fields.dict(2)?,
            },
            code::GOODBYE => WampMessage::Goodbye {
                details: fields.dict(1)?,
                reason: fields.string(2)?,
            },
            code::ERROR => WampMessage::Error {
                request_type: fields.id(1)?,
                request: fields.id(2)?,
                details: fields.dict(3)?,
                error: fields.string(4)?,
                payload: fields.payload(5)?,
            },
            code::PUBLISH => WampMessage::Publish {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                topic: fields.string(3)?,
                payload: fields.payload(4)?,
            },
            code::PUBLISHED => WampMessage::Published {
                request: fields.id(1)?,
                publication: fields.id(2)?,
            },
            code::SUBSCRIBE => WampMessage::Subscribe {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                topic: fields.string(3)?,
            },
            code::SUBSCRIBED => WampMessage::Subscribed {
                request: fields.id(1)?,
                subscription: fields.id(2)?,
            },
            code::EVENT => WampMessage::Event {
                subscription: fields.id(1)?,
                publication: fields.id(2)?,
                details: fields.dict(3)?,
                payload: fields.payload(4)?,
            },
            code::REGISTER => WampMessage::Register {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                procedure: fields.string(3)?,
            },
            code::REGISTERED => WampMessage::Registered {
                request: fields.id(1)?,
                registration: fields.id(2)?,
            },
            code::INVOCATION => WampMessage::Invocation {
                request: fields.id(1)?,
                registration: fields.id(2)?,
                details: fields.dict(3)?,
                payload: fields.payload(4)?,
            },
            code::YIELD => WampMessage::Yield {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                payload: fields.payload(3)?,
            },
            other => return Err(ProtocolError::UnknownCode(other)),
        };

        Ok(message)
    }
}

/// Append arguments only when present, keyword arguments force a
/// (possibly empty) positional list
fn with_payload(mut items: Vec<Value>, payload: &Payload) -> Value {
    if !payload.args.is_empty() || !payload.kwargs.is_empty() {
        items.push(Value::Array(payload.args.clone()));
    }
    if !payload.kwargs.is_empty() {
        items.push(Value::Object(payload.kwargs.clone()));
    }
    Value::Array(items)
}

/// Positional accessor over a decoded message array
struct Fields<'a>(&'a [Value]);

impl Fields<'_> {
    fn get(&self, index: usize) -> Result<&Value, ProtocolError> {
        self.0
            .get(index)
            .ok_or_else(|| ProtocolError::Malformed(format!("missing element {}", index)))
    }

    fn id(&self, index: usize) -> Result<u64, ProtocolError> {
        self.get(index)?
            .as_u64()
            .ok_or_else(|| ProtocolError::Malformed(format!("element {} is not an id", index)))
    }

    fn string(&self, index: usize) -> Result<String, ProtocolError> {
        self.get(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::Malformed(format!("element {} is not a string", index)))
    }

    fn dict(&self, index: usize) -> Result<Dict, ProtocolError> {
        self.get(index)?
            .as_object()
            .cloned()
            .ok_or_else(|| ProtocolError::Malformed(format!("element {} is not a dict", index)))
    }

    /// Optional trailing arguments starting at `index`
    fn payload(&self, index: usize) -> Result<Payload, ProtocolError> {
        let args = match self.0.get(index) {
            None => Vec::new(),
            Some(Value::Array(args)) => args.clone(),
            Some(_) => {
                return Err(ProtocolError::Malformed(format!(
                    "element {} is not an argument list",
                    index
                )))
            }
        };
        let kwargs = match self.0.get(index + 1) {
            None => Dict::new(),
            Some(Value::Object(kwargs)) => kwargs.clone(),
            Some(_) => {
                return Err(ProtocolError::Malformed(format!(
                    "element {} is not a keyword dict",
                    index + 1
                )))
            }
        };
        Ok(Payload { args, kwargs })
    }
}
