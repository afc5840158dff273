use bytes::Bytes;

/// RESP (REdis Serialization Protocol) value types as handed back by a provider
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple String: +OK\r\n
    SimpleString(String),

    /// Error: -Error message\r\n
    ///
    /// Only found as an element of an EXEC reply: providers report a failed
    /// command as an error, not as a value.
    Error(String),

    /// Integer: :1000\r\n
    Integer(i64),

    /// Bulk String: $6\r\nfoobar\r\n or $-1\r\n for null
    BulkString(Option<Bytes>),

    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n for null
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Create a simple string value
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error value
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create an integer value
    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    /// Create a bulk string value
    pub fn bulk_string(s: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(s.into()))
    }

    /// Create a null bulk string value
    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    /// Create an array value
    pub fn array(arr: Vec<RespValue>) -> Self {
        RespValue::Array(Some(arr))
    }

    /// Create a null array value
    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    /// Create OK value
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// True for both null bulk strings and null arrays
    pub fn is_nil(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow the payload of a simple or bulk string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            RespValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(Some(items)) => Some(items),
            _ => None,
        }
    }
}

/// A single store command: the command name followed by its arguments.
///
/// Commands are opaque to the client; they are handed to the provider as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Start a command with its name, e.g. `Command::new("GET")`
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Self {
            args: vec![Bytes::copy_from_slice(name.as_ref())],
        }
    }

    /// Build a command from a full argument vector (name first)
    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        Self {
            args: args
                .into_iter()
                .map(|a| Bytes::copy_from_slice(a.as_ref()))
                .collect(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.args
            .extend(args.into_iter().map(|a| Bytes::copy_from_slice(a.as_ref())));
        self
    }

    /// Upper-cased command name, for logging and matching
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|n| String::from_utf8_lossy(n).to_ascii_uppercase())
            .unwrap_or_default()
    }

    pub fn as_args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}
