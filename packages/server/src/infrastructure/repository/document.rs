//! JSON ドキュメントのライトスルーキャッシュ
//!
//! メモリ上の値を正とし、ファイルパスが設定されている場合は変更のたびに
//! ファイル全体を書き直します（一時ファイルに書いてから rename）。
//! 書き込みに失敗した変更はメモリにも反映されません。

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

use crate::domain::RepositoryError;

/// JSON ドキュメント 1 つ分のストア
pub struct JsonDocument<T> {
    /// 永続化先（None ならメモリのみ）
    path: Option<PathBuf>,
    state: RwLock<T>,
}

impl<T> JsonDocument<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// メモリのみのドキュメントを作成
    pub fn in_memory(initial: T) -> Self {
        Self {
            path: None,
            state: RwLock::new(initial),
        }
    }

    /// ファイルからドキュメントを読み込む
    ///
    /// ファイルが存在しない場合は `initial` で作成する。
    pub async fn open(path: PathBuf, initial: T) -> Result<Self, RepositoryError> {
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RepositoryError::Unavailable(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_atomic(&path, &initial).await?;
                tracing::info!("Created {}", path.display());
                initial
            }
            Err(e) => {
                return Err(RepositoryError::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// 現在の値を読み取る
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// 値を変更する
    ///
    /// `f` がエラーを返した場合、または永続化に失敗した場合は何も変更しない。
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, RepositoryError>,
    ) -> Result<R, RepositoryError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let result = f(&mut next)?;

        if let Some(path) = &self.path {
            write_atomic(path, &next).await?;
        }

        *state = next;
        Ok(result)
    }
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), RepositoryError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| RepositoryError::Persistence(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
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

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("agora-document-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        // テスト項目: 変更はファイルに書き込まれ、再読み込みで復元される
        // given (前提条件):
        let path = temp_path("reload");
        let doc = JsonDocument::open(path.clone(), Vec::<u32>::new())
            .await
            .unwrap();

        // when (操作):
        doc.update(|values| {
            values.push(7);
            Ok(())
        })
        .await
        .unwrap();
        let reopened = JsonDocument::open(path.clone(), Vec::<u32>::new())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(reopened.read(|values| values.clone()).await, vec![7]);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_failed_update_leaves_state_unchanged() {
        // テスト項目: クロージャがエラーを返した場合、値は変更されない
        // given (前提条件):
        let doc = JsonDocument::in_memory(vec![1u32]);

        // when (操作):
        let result: Result<(), RepositoryError> = doc
            .update(|values| {
                values.push(2);
                Err(RepositoryError::AccountNotFound("x".to_string()))
            })
            .await;

        // then (期待する結果):
        assert!(result.is_err());
        assert_eq!(doc.read(|values| values.clone()).await, vec![1]);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_state_unchanged() {
        // テスト項目: 永続化に失敗した場合は Persistence エラーになり、値は変更されない
        // given (前提条件): 書き込み先ディレクトリが存在しないドキュメント
        let dir = std::env::temp_dir().join(format!("agora-missing-{}", uuid::Uuid::new_v4()));
        let doc = JsonDocument {
            path: Some(dir.join("doc.json")),
            state: RwLock::new(vec![1u32]),
        };

        // when (操作):
        let result = doc
            .update(|values| {
                values.push(2);
                Ok(())
            })
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(RepositoryError::Persistence(_))));
        assert_eq!(doc.read(|values| values.clone()).await, vec![1]);
    }
}
