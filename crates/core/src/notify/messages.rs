use crate::order::OrderStatus;

/// Title and body pushed for a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub title: String,
    pub body: String,
}

/// Message template for an order entering `status`.
///
/// Statuses without an entry send no notification.
pub fn status_message(status: OrderStatus, song_title: Option<&str>) -> Option<StatusMessage> {
    let song = song_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t));

    let (title, body) = match status {
        OrderStatus::Paid => (
            "Payment received".to_string(),
            "Thanks for your order! We're writing your lyrics now.".to_string(),
        ),
        OrderStatus::LyricsGenerated => (
            "Your lyrics are ready".to_string(),
            "Two lyric drafts are waiting for your review. Pick your favourite!".to_string(),
        ),
        OrderStatus::MusicGenerating => (
            "Your song is in production".to_string(),
            match &song {
                Some(song) => format!("We're recording {} right now.", song),
                None => "We're recording your song right now.".to_string(),
            },
        ),
        OrderStatus::MusicReady => (
            "Your song is ready".to_string(),
            match &song {
                Some(song) => format!("{} is ready to play.", song),
                None => "Your song is ready to play.".to_string(),
            },
        ),
        OrderStatus::Completed => (
            "Order complete".to_string(),
            match &song {
                Some(song) => format!("Enjoy {}! Thanks for creating with us.", song),
                None => "Enjoy your song! Thanks for creating with us.".to_string(),
            },
        ),
        OrderStatus::Draft
        | OrderStatus::AwaitingPayment
        | OrderStatus::LyricsPending
        | OrderStatus::Approved => return None,
    };

    Some(StatusMessage { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_music_ready_includes_song_title() {
        let message = status_message(OrderStatus::MusicReady, Some("Sail Away")).unwrap();
        assert_eq!(message.title, "Your song is ready");
        assert_eq!(message.body, "\"Sail Away\" is ready to play.");
    }

    #[test]
    fn test_music_ready_without_title() {
        let message = status_message(OrderStatus::MusicReady, Some("  ")).unwrap();
        assert_eq!(message.body, "Your song is ready to play.");
    }

    #[test]
    fn test_only_mapped_statuses_notify() {
        let notifying: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| status_message(*s, None).is_some())
            .collect();

        assert_eq!(
            notifying,
            vec![
                OrderStatus::Paid,
                OrderStatus::LyricsGenerated,
                OrderStatus::MusicGenerating,
                OrderStatus::MusicReady,
                OrderStatus::Completed,
            ]
        );
    }
}
