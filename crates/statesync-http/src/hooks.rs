use async_trait::async_trait;
use statesync_core::{Notice, NoticeLevel, UiHooks};
use tracing::{debug, error, info, warn};

/// UI hooks for a terminal: notices go to the log, saves are never vetoed and
/// there is no file picker.
#[derive(Debug, Default)]
pub struct LogHooks;

#[async_trait]
impl UiHooks for LogHooks {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
    }

    fn set_busy(&self, busy: bool) {
        debug!(busy, "Remote operation {}", if busy { "started" } else { "finished" });
    }
}
