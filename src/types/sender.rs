use std::fmt;

/// Who a displayed message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sender {
    /// The local user.
    User,
    /// The flow's reply.
    Bot,
    /// Informational messages such as the welcome text.
    System,
    /// A failed turn or failed history load.
    Error,
    /// A participant identified only by its display name.
    Named(String),
}

impl Sender {
    /// Returns true for the error sender.
    pub fn is_error(&self) -> bool {
        matches!(self, Sender::Error)
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
            Sender::System => write!(f, "system"),
            Sender::Error => write!(f, "error"),
            Sender::Named(name) => write!(f, "{name}"),
        }
    }
}
