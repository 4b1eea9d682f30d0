//! Human-readable records of messages removed for spam.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

use crate::platform::HistoricMessage;

const RULE: &str = "--------------------------------------------------";

/// Renders the record for one detection. Messages are listed oldest first.
pub fn render(user: UserId, detected_at: DateTime<Utc>, messages: &[HistoricMessage]) -> String {
    let mut sorted: Vec<&HistoricMessage> = messages.iter().collect();
    sorted.sort_by_key(|m| m.info.timestamp);

    let mut out = format!(
        "Spam Detection Log\nUser ID: {}\nDetection Time: {}\nMessage Count: {}\n{}\n\n",
        user,
        detected_at,
        messages.len(),
        RULE,
    );

    for m in sorted {
        out.push_str(&format!("Time: {}\nChannel: #{}\nContent: {}\n", m.info.timestamp, m.channel_name, m.content));
        if m.attachments > 0 {
            out.push_str(&format!("Attachments: {} files\n", m.attachments));
        }
        out.push_str(RULE);
        out.push('\n');
    }

    out
}

/// Writes the record into `dir`, creating it if needed, and returns the file's path.
pub async fn write_record(dir: &Path, user: UserId, detected_at: DateTime<Utc>, messages: &[HistoricMessage]) -> crate::error::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!("spam_detected_{}_{}.txt", detected_at.format("%Y%m%d_%H%M%S"), user);
    let path = dir.join(name);
    tokio::fs::write(&path, render(user, detected_at, messages)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::message_info::MsgInfo;
    use chrono::TimeZone;
    use serenity::model::id::{ChannelId, GuildId, MessageId};
    use tempdir::TempDir;

    fn msg(id: u64, secs: i64, content: &str, attachments: usize) -> HistoricMessage {
        HistoricMessage {
            info: MsgInfo {
                timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                guild: Some(GuildId::new(1)),
                user: UserId::new(9),
                channel: ChannelId::new(2),
                msg: MessageId::new(id),
            },
            channel_name: "general".into(),
            content: content.into(),
            attachments,
        }
    }

    #[test]
    fn records_list_messages_chronologically() {
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let text = render(UserId::new(9), at, &[msg(2, 20, "second", 0), msg(1, 10, "first", 2)]);

        assert!(text.starts_with("Spam Detection Log\nUser ID: 9\n"));
        assert!(text.contains("Message Count: 2"));
        let first = text.find("Content: first").unwrap();
        let second = text.find("Content: second").unwrap();
        assert!(first < second);
        assert!(text.contains("Attachments: 2 files"));
        assert_eq!(text.matches("Attachments:").count(), 1);
        assert!(text.contains("Channel: #general"));
        assert_eq!(text.matches(RULE).count(), 3);
        assert!(text.ends_with(&format!("Content: second\n{}\n", RULE)), "{}", text);
    }

    #[tokio::test]
    async fn records_are_written_to_timestamped_files() {
        let dir = TempDir::new("warden-audit").unwrap();
        let spam_dir = dir.path().join("spam");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = write_record(&spam_dir, UserId::new(9), at, &[msg(1, 0, "hello", 0)]).await.unwrap();

        assert_eq!(path.file_name().unwrap(), "spam_detected_20240309_140507_9.txt");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Content: hello"));
    }
}
