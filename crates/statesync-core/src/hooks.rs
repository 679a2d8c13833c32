use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A non-blocking, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Answer of the before-save hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveVerdict {
    Proceed,
    /// Abort the save. A non-empty message is shown to the user.
    Veto(Option<String>),
}

/// UI surface of the host application. Every hook is optional.
#[async_trait]
pub trait UiHooks: Send + Sync {
    /// Show a message to the user.
    fn notify(&self, _notice: Notice) {}

    /// Toggle a progress indicator around load and save spans.
    fn set_busy(&self, _busy: bool) {}

    /// Veto predicate consulted before every save.
    async fn before_save(&self) -> SaveVerdict {
        SaveVerdict::Proceed
    }

    /// Ask the user to pick a project file. `None` means the user cancelled.
    async fn pick_file(&self) -> Option<String> {
        None
    }
}

/// Hooks that do nothing, used until the host installs its own.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl UiHooks for NoopHooks {}
