//! InMemory Message Log Repository 実装
//!
//! 追記はミューテックスで直列化され、`MessageId` はログ内で単調増加します。
//! `open` で作成した場合は `messages.jsonl`（1 行 1 メッセージ）に追記し、
//! 種別削除（purge）のときのみファイル全体を書き直します。
//!
//! purge で末尾のメッセージが消えても ID が再利用されないよう、
//! 払い出し済み ID の最大値を `messages.seq.json` に記録します。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::domain::{
    Message, MessageDraft, MessageId, MessageKind, MessageLogRepository, RepositoryError,
};
use crate::infrastructure::repository::{JsonDocument, MESSAGES_FILE, MESSAGES_SEQUENCE_FILE};

struct LogState {
    messages: Vec<Message>,
    next_id: MessageId,
}

/// 払い出し済み ID の最大値
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct LogSequence {
    last_id: u64,
}

/// インメモリ Message Log 実装
pub struct InMemoryMessageLogRepository {
    /// 永続化先（None ならメモリのみ）
    path: Option<PathBuf>,
    sequence: JsonDocument<LogSequence>,
    state: Mutex<LogState>,
}

impl InMemoryMessageLogRepository {
    pub fn new() -> Self {
        Self {
            path: None,
            sequence: JsonDocument::in_memory(LogSequence::default()),
            state: Mutex::new(LogState {
                messages: Vec::new(),
                next_id: MessageId::new(1),
            }),
        }
    }

    /// `data_dir` 配下の `messages.jsonl` を読み込む
    ///
    /// 次に払い出す ID は、読み込んだ最大 ID と記録済みの最大 ID のうち大きい方の次の値になる。
    /// 書き込み途中で途切れた最終行は破棄し、ファイルを書き直す。
    pub async fn open(data_dir: &Path) -> Result<Self, RepositoryError> {
        let path = data_dir.join(MESSAGES_FILE);
        let sequence = JsonDocument::open(
            data_dir.join(MESSAGES_SEQUENCE_FILE),
            LogSequence::default(),
        )
        .await?;

        let messages = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let parsed = parse_log(&contents)?;
                if parsed.needs_rewrite {
                    rewrite(&path, &parsed.messages).await?;
                }
                parsed.messages
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(RepositoryError::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let last_id = messages
            .iter()
            .map(|m| m.id.value())
            .max()
            .unwrap_or(0)
            .max(sequence.read(|s| s.last_id).await);

        tracing::info!(
            "Loaded {} messages from {} (last id {})",
            messages.len(),
            path.display(),
            last_id
        );

        Ok(Self {
            path: Some(path),
            sequence,
            state: Mutex::new(LogState {
                messages,
                next_id: MessageId::new(last_id).next(),
            }),
        })
    }
}

impl Default for InMemoryMessageLogRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageLogRepository for InMemoryMessageLogRepository {
    async fn append(&self, draft: MessageDraft) -> Result<Message, RepositoryError> {
        let mut state = self.state.lock().await;
        let message = Message::from_draft(state.next_id, draft);

        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(&message)
                .map_err(|e| RepositoryError::Persistence(e.to_string()))?;
            line.push('\n');
            append_line(path, &line).await?;
        }

        state.next_id = message.id.next();
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.messages.clone())
    }

    async fn purge_kind(&self, kind: MessageKind) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().await;
        let retained: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.kind != kind)
            .cloned()
            .collect();
        let removed = state.messages.len() - retained.len();

        if removed > 0 {
            // 書き直しで最大 ID が消えても続きから払い出せるよう、先に記録する
            let last_issued = state.next_id.value().saturating_sub(1);
            self.sequence
                .update(|sequence| {
                    sequence.last_id = sequence.last_id.max(last_issued);
                    Ok(())
                })
                .await?;
            if let Some(path) = &self.path {
                rewrite(path, &retained).await?;
            }
            state.messages = retained;
        }

        Ok(removed)
    }
}

struct ParsedLog {
    messages: Vec<Message>,
    /// 途切れた最終行がある、または末尾に改行が無い
    needs_rewrite: bool,
}

fn parse_log(contents: &str) -> Result<ParsedLog, RepositoryError> {
    let mut messages = Vec::new();

    for (index, chunk) in contents.split_inclusive('\n').enumerate() {
        let line = chunk.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(message) => messages.push(message),
            // 改行で終わらない最終行は追記の途中で中断されたもの
            Err(e) if !chunk.ends_with('\n') => {
                tracing::warn!(
                    "Discarding torn last line {} of message log: {}",
                    index + 1,
                    e
                );
                return Ok(ParsedLog {
                    messages,
                    needs_rewrite: true,
                });
            }
            Err(e) => {
                return Err(RepositoryError::Unavailable(format!(
                    "line {}: {}",
                    index + 1,
                    e
                )));
            }
        }
    }

    let needs_rewrite = !contents.is_empty() && !contents.ends_with('\n');
    Ok(ParsedLog {
        messages,
        needs_rewrite,
    })
}

/// 1 行追記する
///
/// 書き込みに失敗した場合は追記前の長さに切り詰め、途中までの行を残さない。
async fn append_line(path: &Path, line: &str) -> Result<(), RepositoryError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| RepositoryError::Persistence(format!("{}: {}", path.display(), e)))?;
    let original_len = file
        .metadata()
        .await
        .map_err(|e| RepositoryError::Persistence(format!("{}: {}", path.display(), e)))?
        .len();

    if let Err(e) = write_line(&mut file, line).await {
        if let Err(truncate_error) = file.set_len(original_len).await {
            tracing::error!(
                "Failed to roll back partial append to {}: {}",
                path.display(),
                truncate_error
            );
        }
        return Err(RepositoryError::Persistence(format!(
            "{}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

async fn rewrite(path: &Path, messages: &[Message]) -> Result<(), RepositoryError> {
    let mut contents = String::new();
    for message in messages {
        let line = serde_json::to_string(message)
            .map_err(|e| RepositoryError::Persistence(e.to_string()))?;
        contents.push_str(&line);
        contents.push('\n');
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| RepositoryError::Persistence(format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| RepositoryError::Persistence(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageContent, Recipient, Timestamp, Username};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 追記時の ID 払い出し（単調増加）と順序の保持
    // - 種別削除で対象種別のみが消え、他は元の順序で残ること
    // - JSON Lines ファイルへの追記と再読み込み
    // ========================================

    fn draft(sender: &str, kind: MessageKind, content: &str) -> MessageDraft {
        MessageDraft {
            sender: Username::new(sender.to_string()).unwrap(),
            created_at: Timestamp::new(1000),
            kind,
            content: MessageContent::new(content.to_string()).unwrap(),
            recipient: None,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        // テスト項目: 追記ごとに単調増加する ID が払い出され、追記順に取得できる
        // given (前提条件):
        let log = InMemoryMessageLogRepository::new();

        // when (操作):
        let first = log.append(draft("alice", MessageKind::Global, "one")).await.unwrap();
        let second = log.append(draft("bob", MessageKind::Global, "two")).await.unwrap();

        // then (期待する結果):
        assert!(first.id < second.id);
        let messages = log.list_messages().await.unwrap();
        assert_eq!(messages, vec![first, second]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_unique_ids() {
        // テスト項目: 並行して追記しても ID は重複せず、ログ順と ID 順が一致する
        // given (前提条件):
        let log = std::sync::Arc::new(InMemoryMessageLogRepository::new());

        // when (操作):
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(draft("alice", MessageKind::Global, &format!("m{}", i)))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // then (期待する結果):
        let ids: Vec<u64> = log
            .list_messages()
            .await
            .unwrap()
            .iter()
            .map(|m| m.id.value())
            .collect();
        assert_eq!(ids, (1..=20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_purge_kind_removes_only_that_kind() {
        // テスト項目: 種別削除は対象種別のみを削除し、他の種別は元の順序で残る
        // given (前提条件):
        let log = InMemoryMessageLogRepository::new();
        log.append(draft("alice", MessageKind::Global, "g1")).await.unwrap();
        log.append(draft("alice", MessageKind::Dm, "d1")).await.unwrap();
        log.append(draft("alice", MessageKind::Global, "g2")).await.unwrap();
        log.append(draft("host1", MessageKind::Announcement, "a1")).await.unwrap();

        // when (操作):
        let removed = log.purge_kind(MessageKind::Global).await.unwrap();

        // then (期待する結果):
        assert_eq!(removed, 2);
        let contents: Vec<String> = log
            .list_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content.into_string())
            .collect();
        assert_eq!(contents, vec!["d1".to_string(), "a1".to_string()]);
    }

    async fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("agora-log-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_open_reloads_and_continues_sequence() {
        // テスト項目: ファイルから再読み込みすると履歴が復元され、ID は続きから払い出される
        // given (前提条件):
        let dir = temp_dir().await;
        let log = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        let mut dm = draft("alice", MessageKind::Dm, "hi");
        dm.recipient = Some(Recipient::User(Username::new("bob".to_string()).unwrap()));
        log.append(dm).await.unwrap();
        log.append(draft("alice", MessageKind::Global, "g")).await.unwrap();

        // when (操作):
        let reopened = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        let next = reopened
            .append(draft("bob", MessageKind::Global, "again"))
            .await
            .unwrap();

        // then (期待する結果):
        let messages = reopened.list_messages().await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content.as_str(), "hi");
        assert!(matches!(messages[0].recipient, Some(Recipient::User(_))));
        assert_eq!(next.id.value(), 3);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_purged_ids_are_not_reused_after_reopen() {
        // テスト項目: 末尾のメッセージを purge して再起動しても、その ID は再び払い出されない
        // given (前提条件):
        let dir = temp_dir().await;
        let log = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        let purged = log.append(draft("alice", MessageKind::Global, "g")).await.unwrap();
        log.purge_kind(MessageKind::Global).await.unwrap();

        // when (操作):
        let reopened = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        let next = reopened
            .append(draft("alice", MessageKind::Dm, "after"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_ne!(next.id, purged.id);
        assert!(next.id > purged.id);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_open_discards_torn_last_line() {
        // テスト項目: 書き込み途中で途切れた最終行は破棄され、以後の追記は正しい行として残る
        // given (前提条件):
        let dir = temp_dir().await;
        let log = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        log.append(draft("alice", MessageKind::Global, "first")).await.unwrap();
        let path = dir.join(MESSAGES_FILE);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        file.write_all(br#"{"id":2,"sender":"al"#).await.unwrap();
        file.flush().await.unwrap();

        // when (操作):
        let reopened = InMemoryMessageLogRepository::open(&dir).await.unwrap();
        let next = reopened
            .append(draft("bob", MessageKind::Global, "second"))
            .await
            .unwrap();
        let reloaded = InMemoryMessageLogRepository::open(&dir).await.unwrap();

        // then (期待する結果):
        assert_eq!(next.id.value(), 2);
        let contents: Vec<String> = reloaded
            .list_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content.into_string())
            .collect();
        assert_eq!(contents, vec!["first".to_string(), "second".to_string()]);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_line_in_the_middle() {
        // テスト項目: 改行で終わる不正な行（途中の破損）は読み込みエラーになる
        // given (前提条件):
        let dir = temp_dir().await;
        tokio::fs::write(dir.join(MESSAGES_FILE), "not json\n")
            .await
            .unwrap();

        // when (操作):
        let result = InMemoryMessageLogRepository::open(&dir).await;

        // then (期待する結果):
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
