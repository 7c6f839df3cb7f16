use chrono::{DateTime, Duration, Utc};

use super::types::{Conversation, DeliveryStatus, Message, Sender, User};

/// Contacts every fresh session starts with.
pub fn seed_users() -> Vec<User> {
    vec![
        User::new("user-1", "Mom")
            .with_avatar("https://picsum.photos/id/64/200/200")
            .with_status("Love you! ❤️")
            .with_phone("+1 (555) 010-9999")
            .with_system_instruction(
                "You are a caring, slightly overprotective mother who uses too many emojis. \
                 Keep responses short.",
            ),
        User::new("user-2", "Tech Recruiter")
            .with_avatar("https://picsum.photos/id/1025/200/200")
            .with_status("Hiring React Wizards 🧙‍♂️")
            .with_phone("+1 (555) 023-4567")
            .with_system_instruction(
                "You are a professional tech recruiter. You are formal but enthusiastic \
                 about hiring the user for a Senior React role.",
            ),
        User::new("user-3", "Pizza Place 🍕")
            .with_avatar("https://picsum.photos/id/292/200/200")
            .with_status("Open 10am - 11pm")
            .with_phone("+1 (555) 999-0000")
            .with_system_instruction(
                "You are a pizza shop order bot. You allow ordering pizza. \
                 You are helpful and hungry.",
            ),
        User::new("user-4", "Bestie")
            .with_avatar("https://picsum.photos/id/338/200/200")
            .with_status("Living my best life")
            .with_phone("+1 (555) 777-1234")
            .with_system_instruction(
                "You are the users best friend. You are casual, use slang like \"fr\", \
                 \"ngl\", \"lol\", and support everything they say.",
            ),
    ]
}

/// Seed conversations, timestamped relative to `now`.
pub fn seed_conversations(now: DateTime<Utc>) -> Vec<Conversation> {
    let minutes = |value: i64| now - Duration::minutes(value);
    let hours = |value: i64| now - Duration::hours(value);

    vec![
        Conversation::new("chat-1", "user-1", minutes(5))
            .with_unread_count(2)
            .with_messages(vec![
                Message::new(
                    "m1",
                    "Did you eat lunch yet?",
                    Sender::Remote,
                    minutes(60),
                    DeliveryStatus::Read,
                ),
                Message::new(
                    "m2",
                    "Call me when you can!",
                    Sender::Remote,
                    minutes(5),
                    DeliveryStatus::Delivered,
                ),
            ]),
        Conversation::new("chat-2", "user-2", hours(24)).with_messages(vec![
            Message::new(
                "m3",
                "Hi! I saw your GitHub profile.",
                Sender::Remote,
                hours(24),
                DeliveryStatus::Read,
            ),
            Message::new(
                "m4",
                "Thanks! I am interested.",
                Sender::Local,
                hours(23),
                DeliveryStatus::Read,
            ),
        ]),
        Conversation::new("chat-4", "user-4", hours(48)).with_messages(vec![
            Message::new(
                "m5",
                "Going to the party tonight?",
                Sender::Local,
                hours(48),
                DeliveryStatus::Read,
            ),
            Message::new(
                "m6",
                "Yesss cant wait!",
                Sender::Remote,
                hours(47),
                DeliveryStatus::Read,
            ),
        ]),
        Conversation::new("chat-3", "user-3", hours(72)).with_messages(vec![Message::new(
            "m7",
            "Your order has been delivered.",
            Sender::Remote,
            hours(72),
            DeliveryStatus::Read,
        )]),
    ]
}
