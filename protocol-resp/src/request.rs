//! Client-side request encoding.
//!
//! Commands are encoded as RESP arrays of bulk strings: argument bytes go on
//! the wire verbatim, lengths and counts as decimal ASCII. [`Request`] is a
//! fluent builder over borrowed argument slices; [`encode`](Request::encode)
//! produces the owned wire payload.

/// A request builder for encoding commands.
///
/// # Example
///
/// ```
/// use protocol_resp::Request;
///
/// let get = Request::get(b"mykey").encode();
/// assert_eq!(get, b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
///
/// let set = Request::set(b"mykey", b"v").ex(60).encode();
/// ```
#[derive(Debug, Clone)]
pub struct Request<'a> {
    args: Vec<&'a [u8]>,
}

impl<'a> Request<'a> {
    /// Create a request from raw arguments.
    #[inline]
    pub fn new(args: Vec<&'a [u8]>) -> Self {
        Self { args }
    }

    /// Create a PING command.
    #[inline]
    pub fn ping() -> Self {
        Self {
            args: vec![b"PING"],
        }
    }

    /// Create a GET command.
    #[inline]
    pub fn get(key: &'a [u8]) -> Self {
        Self {
            args: vec![b"GET", key],
        }
    }

    /// Create a SET command; expiry and existence options chain on the
    /// returned builder.
    #[inline]
    pub fn set(key: &'a [u8], value: &'a [u8]) -> SetRequest<'a> {
        SetRequest {
            key,
            value,
            ex: None,
            px: None,
            nx: false,
            xx: false,
        }
    }

    /// Create a SETNX command.
    #[inline]
    pub fn set_nx(key: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            args: vec![b"SETNX", key, value],
        }
    }

    /// Create a DEL command.
    #[inline]
    pub fn del(key: &'a [u8]) -> Self {
        Self {
            args: vec![b"DEL", key],
        }
    }

    /// Create an AUTH command.
    #[inline]
    pub fn auth(password: &'a [u8]) -> Self {
        Self {
            args: vec![b"AUTH", password],
        }
    }

    /// Create an INFO command.
    #[inline]
    pub fn info() -> Self {
        Self {
            args: vec![b"INFO"],
        }
    }

    /// Create a custom command with arbitrary arguments.
    #[inline]
    pub fn cmd(name: &'a [u8]) -> Self {
        Self { args: vec![name] }
    }

    /// Add an argument to the command.
    #[inline]
    pub fn arg(mut self, arg: &'a [u8]) -> Self {
        self.args.push(arg);
        self
    }

    /// Encode this request into an owned wire payload.
    pub fn encode(&self) -> Vec<u8> {
        encode_command(&self.args)
    }

    /// Exact encoded length of this request.
    pub fn encoded_len(&self) -> usize {
        encoded_command_len(&self.args)
    }
}

/// Builder for SET commands with options.
#[derive(Debug, Clone)]
pub struct SetRequest<'a> {
    key: &'a [u8],
    value: &'a [u8],
    ex: Option<u64>,
    px: Option<u64>,
    nx: bool,
    xx: bool,
}

impl<'a> SetRequest<'a> {
    /// Expire in seconds (EX). Clears any PX option.
    #[inline]
    pub fn ex(mut self, seconds: u64) -> Self {
        self.ex = Some(seconds);
        self.px = None;
        self
    }

    /// Expire in milliseconds (PX). Clears any EX option.
    #[inline]
    pub fn px(mut self, milliseconds: u64) -> Self {
        self.px = Some(milliseconds);
        self.ex = None;
        self
    }

    /// Only set if the key does not exist (NX). Clears XX.
    #[inline]
    pub fn nx(mut self) -> Self {
        self.nx = true;
        self.xx = false;
        self
    }

    /// Only set if the key exists (XX). Clears NX.
    #[inline]
    pub fn xx(mut self) -> Self {
        self.xx = true;
        self.nx = false;
        self
    }

    /// Encode this SET request into an owned wire payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut ex_buf = itoa::Buffer::new();
        let mut px_buf = itoa::Buffer::new();

        let mut args: Vec<&[u8]> = vec![b"SET", self.key, self.value];
        if let Some(seconds) = self.ex {
            args.push(b"EX");
            args.push(ex_buf.format(seconds).as_bytes());
        } else if let Some(millis) = self.px {
            args.push(b"PX");
            args.push(px_buf.format(millis).as_bytes());
        }
        if self.nx {
            args.push(b"NX");
        } else if self.xx {
            args.push(b"XX");
        }

        encode_command(&args)
    }
}

/// Encode an argument list as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_command_len(args).max(64));
    let mut len_buf = itoa::Buffer::new();

    buf.push(b'*');
    buf.extend_from_slice(len_buf.format(args.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for arg in args {
        buf.push(b'$');
        buf.extend_from_slice(len_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }

    buf
}

fn encoded_command_len(args: &[&[u8]]) -> usize {
    let mut len_buf = itoa::Buffer::new();

    // *<count>\r\n
    let mut len = 1 + len_buf.format(args.len()).len() + 2;
    // $<len>\r\n<data>\r\n per argument
    for arg in args {
        len += 1 + len_buf.format(arg.len()).len() + 2 + arg.len() + 2;
    }
    len
}
