use std::fmt;
use std::str::FromStr;

use crate::error::StateError;
use crate::observe::Observed;
use crate::value::{Key, Object, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AsyncStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl AsyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsyncStatus::Idle => "idle",
            AsyncStatus::Pending => "pending",
            AsyncStatus::Success => "success",
            AsyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for AsyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown async status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for AsyncStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(AsyncStatus::Idle),
            "pending" => Ok(AsyncStatus::Pending),
            "success" => Ok(AsyncStatus::Success),
            "error" => Ok(AsyncStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// State-shape convention for an asynchronous operation's outcome.
/// Carries no behaviour; store it in a model's state with
/// [`Observed::set_async`].
#[derive(Clone, Debug, PartialEq)]
pub struct AsyncResult<T, E = String> {
    pub status: AsyncStatus,
    pub data: Option<T>,
    pub error: Option<E>,
}

impl<T, E> Default for AsyncResult<T, E> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T, E> AsyncResult<T, E> {
    pub fn idle() -> Self {
        Self {
            status: AsyncStatus::Idle,
            data: None,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            status: AsyncStatus::Pending,
            data: None,
            error: None,
        }
    }

    pub fn success(data: T) -> Self {
        Self {
            status: AsyncStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: E) -> Self {
        Self {
            status: AsyncStatus::Error,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == AsyncStatus::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.status == AsyncStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == AsyncStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == AsyncStatus::Error
    }
}

impl<T, E> From<Result<T, E>> for AsyncResult<T, E> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(e),
        }
    }
}

impl<T: Into<Value>, E: fmt::Display> From<AsyncResult<T, E>> for Value {
    fn from(r: AsyncResult<T, E>) -> Self {
        let fields: [(&str, Value); 3] = [
            ("status", r.status.as_str().into()),
            ("data", r.data.into()),
            ("error", r.error.map(|e| e.to_string()).into()),
        ];
        Value::Object(fields.into_iter().collect::<Object>())
    }
}

impl AsyncResult<Value, String> {
    /// Reads back an object written by [`Observed::set_async`]. `None` if the
    /// view does not have that shape.
    pub fn from_observed(view: &Observed) -> Option<Self> {
        let status = view.get("status")?.as_str()?.parse::<AsyncStatus>().ok()?;
        let data = view.get("data").filter(|v| !v.is_null());
        let error = match view.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::Str(s)) => Some(s),
            Some(_) => return None,
        };
        Some(Self {
            status,
            data,
            error,
        })
    }
}

impl Observed {
    /// Stores `result` under `key` as a `{status, data, error}` object.
    /// Always a fresh object, so always one notification.
    pub fn set_async<T: Into<Value>, E: fmt::Display>(
        &self,
        key: impl Into<Key>,
        result: AsyncResult<T, E>,
    ) -> Result<(), StateError> {
        self.set(key, Value::from(result))
    }
}
