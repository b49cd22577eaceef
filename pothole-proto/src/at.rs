//! AT commands for the cellular modem's bearer and HTTP stack.
//!
//! Every command goes out as ASCII followed by CRLF. A report is a fixed
//! session of seven commands with the raw JSON body written between
//! `AT+HTTPDATA` and `AT+HTTPACTION`:
//!
//! ```text
//! AT+HTTPINIT
//! AT+HTTPPARA="CID",1
//! AT+HTTPPARA="URL","<url>"
//! AT+HTTPPARA="CONTENT","application/json"
//! AT+HTTPDATA=<len>,10000
//! <body>
//! AT+HTTPACTION=1
//! AT+HTTPTERM
//! ```

use core::fmt;
use core::fmt::Write;

use crate::fmt::SliceWriter;
use crate::serialize::SerializeError;

/// Bearer profile the HTTP context is bound to.
pub const BEARER_CID: u8 = 1;

/// Access point name used when none is configured.
pub const DEFAULT_APN: &str = "internet";

/// Collector endpoint used when none is configured.
pub const DEFAULT_COLLECTOR_URL: &str = "http://195.35.23.26/api/potholes";

/// Content type of the report body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// How long the modem waits for the announced body, in milliseconds.
pub const HTTP_DATA_TIMEOUT_MS: u32 = 10_000;

/// `AT+HTTPACTION` method code for POST.
pub const HTTP_ACTION_POST: u8 = 1;

/// Commands issued per report, not counting the body.
pub const HTTP_POST_COMMAND_COUNT: usize = 7;

/// Steps in a report session, body included.
pub const HTTP_POST_STEP_COUNT: usize = HTTP_POST_COMMAND_COUNT + 1;

/// One modem command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtCommand<'a> {
    /// `AT`
    Attention,
    /// `AT+SAPBR=3,1,"<key>","<value>"`
    BearerParam { key: &'a str, value: &'a str },
    /// `AT+SAPBR=1,1`
    BearerOpen,
    /// `AT+HTTPINIT`
    HttpInit,
    /// `AT+HTTPPARA="CID",<cid>`
    HttpCid(u8),
    /// `AT+HTTPPARA="URL","<url>"`
    HttpUrl(&'a str),
    /// `AT+HTTPPARA="CONTENT","<type>"`
    HttpContent(&'a str),
    /// `AT+HTTPDATA=<len>,<timeout_ms>`
    HttpData { len: usize, timeout_ms: u32 },
    /// `AT+HTTPACTION=<method>`
    HttpAction(u8),
    /// `AT+HTTPTERM`
    HttpTerm,
}

impl AtCommand<'_> {
    /// Write the command and its CRLF terminator into `buf`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if `buf` cannot hold the command.
    pub fn render(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = SliceWriter::new(buf);
        write!(w, "{}\r\n", self).map_err(|_| SerializeError::BufferTooSmall)?;
        Ok(w.len())
    }
}

impl fmt::Display for AtCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attention => f.write_str("AT"),
            Self::BearerParam { key, value } => {
                write!(f, "AT+SAPBR=3,{},\"{}\",\"{}\"", BEARER_CID, key, value)
            }
            Self::BearerOpen => write!(f, "AT+SAPBR=1,{}", BEARER_CID),
            Self::HttpInit => f.write_str("AT+HTTPINIT"),
            Self::HttpCid(cid) => write!(f, "AT+HTTPPARA=\"CID\",{}", cid),
            Self::HttpUrl(url) => write!(f, "AT+HTTPPARA=\"URL\",\"{}\"", url),
            Self::HttpContent(ty) => write!(f, "AT+HTTPPARA=\"CONTENT\",\"{}\"", ty),
            Self::HttpData { len, timeout_ms } => write!(f, "AT+HTTPDATA={},{}", len, timeout_ms),
            Self::HttpAction(method) => write!(f, "AT+HTTPACTION={}", method),
            Self::HttpTerm => f.write_str("AT+HTTPTERM"),
        }
    }
}

/// Commands that attach the GPRS bearer. Issued once, not per report.
#[must_use]
pub fn bearer_setup_commands(apn: &str) -> [AtCommand<'_>; 4] {
    [
        AtCommand::Attention,
        AtCommand::BearerParam {
            key: "Contype",
            value: "GPRS",
        },
        AtCommand::BearerParam {
            key: "APN",
            value: apn,
        },
        AtCommand::BearerOpen,
    ]
}

/// A step of the report session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionStep<'a> {
    Command(AtCommand<'a>),
    /// The serialized report goes out verbatim, without a terminator.
    Body,
}

/// The ordered steps of one HTTP POST.
#[must_use]
pub fn http_post_session<'a>(
    url: &'a str,
    content_type: &'a str,
    body_len: usize,
    timeout_ms: u32,
) -> [SessionStep<'a>; HTTP_POST_STEP_COUNT] {
    [
        SessionStep::Command(AtCommand::HttpInit),
        SessionStep::Command(AtCommand::HttpCid(BEARER_CID)),
        SessionStep::Command(AtCommand::HttpUrl(url)),
        SessionStep::Command(AtCommand::HttpContent(content_type)),
        SessionStep::Command(AtCommand::HttpData {
            len: body_len,
            timeout_ms,
        }),
        SessionStep::Body,
        SessionStep::Command(AtCommand::HttpAction(HTTP_ACTION_POST)),
        SessionStep::Command(AtCommand::HttpTerm),
    ]
}
