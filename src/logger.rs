/// Target reserved for group events, never printed as-is.
pub const GROUP_TARGET: &str = "roofline::group";
pub const OPENED_GROUP_TARGET: &str = "roofline::group::opened";

#[macro_export]
/// Start a new log group. All logs between this and the next `end_group!` will be grouped together.
///
/// # Example
///
/// ```rust,ignore
/// start_group!("Building addition");
/// info!("This will be grouped");
/// end_group!();
/// ```
macro_rules! start_group {
    ($name:expr) => {
        log::log!(target: $crate::logger::GROUP_TARGET, log::Level::Info, "{}", $name);
    };
}

#[macro_export]
/// Start a group whose content stays visible once it ends.
macro_rules! start_opened_group {
    ($name:expr) => {
        log::log!(target: $crate::logger::OPENED_GROUP_TARGET, log::Level::Info, "{}", $name);
    };
}

#[macro_export]
/// End the current log group.
/// See [`start_group!`] for more information.
macro_rules! end_group {
    () => {
        log::log!(target: $crate::logger::GROUP_TARGET, log::Level::Info, "");
    };
}

#[derive(Debug, PartialEq)]
pub enum GroupEvent {
    Start(String),
    StartOpened(String),
    End,
}

/// Returns the group event if the record is a group event, otherwise returns `None`.
pub(crate) fn get_group_event(record: &log::Record) -> Option<GroupEvent> {
    match record.target() {
        OPENED_GROUP_TARGET => {
            let args = record.args().to_string();
            if args.is_empty() {
                None
            } else {
                Some(GroupEvent::StartOpened(args))
            }
        }
        GROUP_TARGET => {
            let args = record.args().to_string();
            if args.is_empty() {
                Some(GroupEvent::End)
            } else {
                Some(GroupEvent::Start(args))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(target: &str, message: &str) -> Option<GroupEvent> {
        get_group_event(
            &log::Record::builder()
                .target(target)
                .args(format_args!("{message}"))
                .build(),
        )
    }

    #[test]
    fn test_group_events() {
        assert_eq!(
            event(GROUP_TARGET, "Measuring latency"),
            Some(GroupEvent::Start("Measuring latency".into()))
        );
        assert_eq!(event(GROUP_TARGET, ""), Some(GroupEvent::End));
        assert_eq!(
            event(OPENED_GROUP_TARGET, "Sweep"),
            Some(GroupEvent::StartOpened("Sweep".into()))
        );
        assert_eq!(event("executor", "stdout line"), None);
    }
}
