use crate::generation::ChatMessage;
use crate::order::Order;

pub const SYSTEM_PROMPT: &str = "You are a professional songwriter who writes personalized, singable song lyrics. \
Write original lyrics only, with clear verse and chorus structure. \
Never include explanations, notes or commentary outside the lyrics.";

/// Rough number of sung lines that fit the target duration.
fn line_budget(duration_secs: u32) -> u32 {
    (duration_secs / 6).clamp(8, 60)
}

/// Build the system and user messages for an order.
pub fn build_messages(order: &Order) -> Vec<ChatMessage> {
    let user = format!(
        "Write song lyrics for the following order.\n\
         \n\
         Occasion: {occasion}\n\
         Musical style: {style}\n\
         Tone: {tone}\n\
         Target length: about {duration} seconds (roughly {lines} lines)\n\
         \n\
         Story from the customer:\n\
         {story}\n\
         \n\
         Write TWO different versions of the lyrics. \
         Start each version with its song title alone on the first line, \
         followed by the lyrics. \
         Separate the two versions with a line containing only ---",
        occasion = order.occasion,
        style = order.style,
        tone = order.tone,
        duration = order.duration_secs,
        lines = line_budget(order.duration_secs),
        story = order.story,
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use crate::testing::fixtures;

    #[test]
    fn test_prompt_embeds_brief_and_delimiter_instruction() {
        let order = fixtures::order(OrderStatus::Paid);
        let messages = build_messages(&order);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");

        let user = &messages[1].content;
        assert!(user.contains(&order.occasion));
        assert!(user.contains(&order.style));
        assert!(user.contains(&order.tone));
        assert!(user.contains(&order.story));
        assert!(user.contains("TWO different versions"));
        assert!(user.ends_with("a line containing only ---"));
    }

    #[test]
    fn test_line_budget_is_clamped() {
        assert_eq!(line_budget(30), 8);
        assert_eq!(line_budget(180), 30);
        assert_eq!(line_budget(600), 60);
    }
}
