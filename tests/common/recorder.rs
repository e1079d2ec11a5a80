//! Transport double that records every outbound call

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use roadpass::conversation::reply::Markup;
use roadpass::telegram::{MessageRef, Transport};
use roadpass::AppResult;

/// One outbound call, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        markup: Markup,
        message: MessageRef,
    },
    Photo {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
        markup: Markup,
        message: MessageRef,
    },
    Audio {
        chat_id: i64,
        file_id: String,
    },
    EditText {
        message: MessageRef,
        text: String,
    },
    EditCaption {
        message: MessageRef,
        caption: String,
    },
    Delete(MessageRef),
    Answer {
        callback_id: String,
        alert: Option<String>,
    },
}

#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Sent>>,
    next_message_id: Mutex<i32>,
}

impl RecordingTransport {
    /// Everything recorded so far, clearing the log.
    pub fn drain(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: Sent) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        let mut id = self.next_message_id.lock().unwrap();
        *id += 1;
        MessageRef {
            chat_id,
            message_id: *id,
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, text: &str, markup: &Markup) -> AppResult<MessageRef> {
        let message = self.next_ref(chat_id);
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
            markup: markup.clone(),
            message,
        });
        Ok(message)
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        markup: &Markup,
    ) -> AppResult<MessageRef> {
        let message = self.next_ref(chat_id);
        self.record(Sent::Photo {
            chat_id,
            file_id: file_id.to_string(),
            caption: caption.map(str::to_string),
            markup: markup.clone(),
            message,
        });
        Ok(message)
    }

    async fn send_audio(&self, chat_id: i64, file_id: &str, _caption: Option<&str>) -> AppResult<MessageRef> {
        self.record(Sent::Audio {
            chat_id,
            file_id: file_id.to_string(),
        });
        Ok(self.next_ref(chat_id))
    }

    async fn edit_message_text(&self, message: MessageRef, text: &str, _markup: &Markup) -> AppResult<()> {
        self.record(Sent::EditText {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_message_caption(&self, message: MessageRef, caption: &str) -> AppResult<()> {
        self.record(Sent::EditCaption {
            message,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> AppResult<()> {
        self.record(Sent::Delete(message));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> AppResult<()> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            alert: alert.map(str::to_string),
        });
        Ok(())
    }
}
