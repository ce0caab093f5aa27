//! Compact spec strings and credential capture.
//!
//! Two grammars let an operator describe a backup target in one argument:
//!
//! - database: `<type>@<host>:<port>/<name>` (the name may contain `/`)
//! - object store: `[<scheme>://]<address>/<bucket>`
//!
//! Credentials are either given inline or captured interactively through a
//! [`SecretPrompt`]. Captured values are only ever embedded in the resulting
//! document; they are never logged and never shown by `Debug`.

use std::fmt;
use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BackupError, ParseError};

const DATABASE_TEMPLATE: &str = "dbType@dbUri:dbPort/dbName";
const OBJECT_STORE_TEMPLATE: &str = "endpoint/bucket";

// Loose port group: a non-numeric port is InvalidPort, not a format error.
static DATABASE_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[^@]+)@(?P<host>[^:]+):(?P<port>[^/]+)/(?P<name>.+)$")
        .unwrap_or_else(|e| unreachable!("database spec pattern is valid: {e}"))
});

static OBJECT_STORE_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<endpoint>[^/]+)/(?P<bucket>.+)$")
        .unwrap_or_else(|e| unreachable!("object store spec pattern is valid: {e}"))
});

/// A database location decoded from `<type>@<host>:<port>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub db_name: String,
}

/// Decode a database spec string.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSpecFormat`] if the string does not have the
/// four-part shape and [`ParseError::InvalidPort`] if the port is not an
/// integer in `1..=65535`.
pub fn parse_database_spec(input: &str) -> Result<DatabaseTarget, ParseError> {
    let caps = DATABASE_SPEC
        .captures(input)
        .ok_or_else(|| ParseError::InvalidSpecFormat {
            flag: "--db",
            input: input.to_owned(),
            expected: DATABASE_TEMPLATE,
        })?;

    let port_str = &caps["port"];
    let port = port_str
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ParseError::InvalidPort {
            value: port_str.to_owned(),
        })?;

    Ok(DatabaseTarget {
        db_type: caps["type"].to_owned(),
        host: caps["host"].to_owned(),
        port,
        db_name: caps["name"].to_owned(),
    })
}

/// An object storage location decoded from `[<scheme>://]<address>/<bucket>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreTarget {
    /// Scheme without `://`; empty when none was given.
    pub scheme: String,
    pub address: String,
    pub bucket: String,
}

impl ObjectStoreTarget {
    /// The normalized endpoint, `<scheme>://<address>`.
    ///
    /// With no scheme this yields a leading `://`, which is the form the
    /// backup controller has always received.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}://{}", self.scheme, self.address)
    }
}

/// Decode an object-store spec string.
///
/// The scheme is split off first, so `https://s3.example.com/bucket` keeps
/// its full endpoint instead of being cut at the first `/`. A `://` after
/// the first `/` belongs to the bucket.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSpecFormat`] if no `<endpoint>/<bucket>`
/// shape remains after the scheme.
pub fn parse_object_store_spec(input: &str) -> Result<ObjectStoreTarget, ParseError> {
    let (scheme, rest) = input
        .split_once("://")
        .filter(|(scheme, _)| !scheme.contains('/'))
        .unwrap_or(("", input));
    let caps = OBJECT_STORE_SPEC
        .captures(rest)
        .ok_or_else(|| ParseError::InvalidSpecFormat {
            flag: "--s3",
            input: input.to_owned(),
            expected: OBJECT_STORE_TEMPLATE,
        })?;

    Ok(ObjectStoreTarget {
        scheme: scheme.to_owned(),
        address: caps["endpoint"].to_owned(),
        bucket: caps["bucket"].to_owned(),
    })
}

/// Split a `<key>=<value>` argument on the first `=`.
///
/// # Errors
///
/// Returns [`ParseError::InvalidAssignment`] if there is no `=` or the key
/// is empty.
pub fn split_assignment<'a>(
    input: &'a str,
    expected: &'static str,
) -> Result<(&'a str, &'a str), ParseError> {
    input
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| ParseError::InvalidAssignment {
            input: input.to_owned(),
            expected,
        })
}

/// Reads a secret from the operator without echoing it.
pub trait SecretPrompt {
    /// Show `label` and return the line the operator typed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the input channel fails or is closed.
    fn read_secret(&self, label: &str) -> io::Result<String>;
}

/// Where a credential comes from.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum SecretSource {
    /// The value was given on the command line.
    Inline(String),
    /// Ask the operator interactively.
    Prompt,
    /// Not supplied; stored as an empty string.
    #[default]
    Absent,
}

impl SecretSource {
    /// Build a source from the paired inline/prompt flags.
    #[must_use]
    pub fn from_flags(inline: Option<String>, prompt: bool) -> Self {
        match (inline, prompt) {
            (_, true) => Self::Prompt,
            (Some(value), false) => Self::Inline(value),
            (None, false) => Self::Absent,
        }
    }

    /// Turn this source into a plain value, prompting if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SecretInput`] if the prompt fails.
    pub fn resolve(
        self,
        field: &'static str,
        label: &str,
        prompt: &dyn SecretPrompt,
    ) -> Result<String, BackupError> {
        match self {
            Self::Inline(value) => Ok(value),
            Self::Absent => Ok(String::new()),
            Self::Prompt => prompt
                .read_secret(label)
                .map_err(|e| BackupError::SecretInput {
                    field,
                    reason: e.to_string(),
                }),
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::Prompt => f.write_str("Prompt"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// A prompt that refuses to ask, for non-interactive callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl SecretPrompt for NoPrompt {
    fn read_secret(&self, label: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("interactive input is not available for '{label}'"),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted(RefCell<Vec<String>>);

    impl SecretPrompt for Scripted {
        fn read_secret(&self, _label: &str) -> io::Result<String> {
            self.0
                .borrow_mut()
                .pop()
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }
    }

    #[test]
    fn parses_database_spec() {
        let target = parse_database_spec("postgres@db.local:5432/app").unwrap();
        assert_eq!(
            target,
            DatabaseTarget {
                db_type: "postgres".to_owned(),
                host: "db.local".to_owned(),
                port: 5432,
                db_name: "app".to_owned(),
            }
        );
    }

    #[test]
    fn database_name_keeps_embedded_slashes() {
        let target = parse_database_spec("postgres@db.local:5432/app/v2").unwrap();
        assert_eq!(target.db_name, "app/v2");
    }

    #[test]
    fn non_numeric_port_is_invalid_port() {
        let err = parse_database_spec("pg@host:abc/db").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidPort {
                value: "abc".to_owned()
            }
        );
    }

    #[test]
    fn out_of_range_ports_are_invalid() {
        assert!(matches!(
            parse_database_spec("pg@host:0/db").unwrap_err(),
            ParseError::InvalidPort { .. }
        ));
        assert!(matches!(
            parse_database_spec("pg@host:70000/db").unwrap_err(),
            ParseError::InvalidPort { .. }
        ));
    }

    #[test]
    fn malformed_database_spec_is_format_error() {
        for input in ["", "postgres", "postgres@host/db", "@host:5432/db", "pg@host:5432/"] {
            assert!(
                matches!(
                    parse_database_spec(input).unwrap_err(),
                    ParseError::InvalidSpecFormat { .. }
                ),
                "expected format error for {input:?}"
            );
        }
    }

    #[test]
    fn object_store_with_scheme_round_trips() {
        let target = parse_object_store_spec("https://s3.example.com/mybucket").unwrap();
        assert_eq!(target.scheme, "https");
        assert_eq!(target.address, "s3.example.com");
        assert_eq!(target.bucket, "mybucket");
        assert_eq!(target.endpoint(), "https://s3.example.com");
    }

    #[test]
    fn object_store_without_scheme_gets_leading_separator() {
        let target = parse_object_store_spec("s3.example.com/mybucket").unwrap();
        assert_eq!(target.scheme, "");
        assert_eq!(target.endpoint(), "://s3.example.com");
        assert_eq!(target.bucket, "mybucket");
    }

    #[test]
    fn object_store_bucket_keeps_remainder() {
        let target = parse_object_store_spec("http://minio:9000/backups/pg").unwrap();
        assert_eq!(target.endpoint(), "http://minio:9000");
        assert_eq!(target.bucket, "backups/pg");

        let target = parse_object_store_spec("s3.example.com/bucket://x").unwrap();
        assert_eq!(target.scheme, "");
        assert_eq!(target.endpoint(), "://s3.example.com");
        assert_eq!(target.bucket, "bucket://x");
    }

    #[test]
    fn malformed_object_store_spec_is_format_error() {
        for input in ["", "bucketonly", "https://host", "/bucket", "https:///bucket"] {
            assert!(
                matches!(
                    parse_object_store_spec(input).unwrap_err(),
                    ParseError::InvalidSpecFormat { .. }
                ),
                "expected format error for {input:?}"
            );
        }
    }

    #[test]
    fn split_assignment_uses_first_equals() {
        assert_eq!(
            split_assignment("pg=http://a?b=c", "<name>=<url>").unwrap(),
            ("pg", "http://a?b=c")
        );
        assert_eq!(split_assignment("k=", "<k>=<v>").unwrap(), ("k", ""));
        assert!(split_assignment("novalue", "<k>=<v>").is_err());
        assert!(split_assignment("=v", "<k>=<v>").is_err());
    }

    #[test]
    fn secret_source_prefers_prompt_flag() {
        assert_eq!(
            SecretSource::from_flags(None, true),
            SecretSource::Prompt
        );
        assert_eq!(
            SecretSource::from_flags(Some("u".to_owned()), false),
            SecretSource::Inline("u".to_owned())
        );
        assert_eq!(SecretSource::from_flags(None, false), SecretSource::Absent);
    }

    #[test]
    fn resolve_uses_prompt_only_when_asked() {
        let prompt = Scripted(RefCell::new(vec!["typed".to_owned()]));
        let inline = SecretSource::Inline("given".to_owned())
            .resolve("db user", "Enter DB User: ", &prompt)
            .unwrap();
        assert_eq!(inline, "given");
        let typed = SecretSource::Prompt
            .resolve("db user", "Enter DB User: ", &prompt)
            .unwrap();
        assert_eq!(typed, "typed");
        let err = SecretSource::Prompt
            .resolve("db password", "Enter DB Password: ", &prompt)
            .unwrap_err();
        assert!(matches!(err, BackupError::SecretInput { field: "db password", .. }));
    }

    #[test]
    fn debug_never_shows_inline_secret() {
        let shown = format!("{:?}", SecretSource::Inline("hunter2".to_owned()));
        assert!(!shown.contains("hunter2"));
    }
}
