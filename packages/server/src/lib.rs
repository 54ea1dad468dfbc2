//! Agora chat server library
//!
//! - `domain`: ドメインモデルと配信ポリシー
//! - `usecase`: 送信判定・配信・モデレーション
//! - `infrastructure`: ストア実装、WebSocket 送信、DTO
//! - `ui`: axum のルーティングとハンドラ

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
