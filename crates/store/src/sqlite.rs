use rusqlite::Connection;

use campuschat_core::{Message, MessageId, StoreClock, Timestamp, UNKNOWN_SENDER, UserId};

use crate::changes::{ChangeEvent, ChangeFeed, Subscription};
use crate::error::StoreError;
use crate::traits::{MessageFilter, MessageStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StoreError> {
    v.try_into()
        .map_err(|_| StoreError::Serialization(format!("invalid {label} length")))
}

/// Reference [`MessageStore`] backed by SQLite.
///
/// The `online` toggle exists for the harness: an offline store refuses
/// reads, writes and new subscriptions with [`StoreError::Offline`] so the
/// engine's degraded paths can be exercised deterministically.
pub struct SqliteMessageStore {
    conn: Connection,
    clock: StoreClock,
    feed: ChangeFeed,
    online: bool,
}

impl SqliteMessageStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::with_conn(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::with_conn(conn))
    }

    fn with_conn(conn: Connection) -> Self {
        Self {
            conn,
            clock: StoreClock::new(),
            feed: ChangeFeed::new(),
            online: true,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Drop every live change feed, pushing a final `Disconnected` event.
    pub fn disconnect_streams(&mut self) {
        self.feed.disconnect_all();
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.online {
            Ok(())
        } else {
            Err(StoreError::Offline)
        }
    }
}

const SELECT_MESSAGE: &str = "
    SELECT m.message_id, m.sender_id, m.recipient_id, m.body,
           m.created_at, m.is_read, p.full_name
    FROM messages m
    LEFT JOIN profiles p ON p.user_id = m.sender_id
";

fn read_message(row: &rusqlite::Row) -> Result<Message, StoreError> {
    let message_id_bytes: Vec<u8> = row.get(0)?;
    let sender_id_bytes: Vec<u8> = row.get(1)?;
    let recipient_id_bytes: Option<Vec<u8>> = row.get(2)?;
    let body: String = row.get(3)?;
    let created_at: i64 = row.get(4)?;
    let read: bool = row.get(5)?;
    let sender_name: Option<String> = row.get(6)?;

    let recipient_id = match recipient_id_bytes {
        Some(bytes) => Some(UserId::from_bytes(to_array::<16>(bytes, "recipient_id")?)),
        None => None,
    };

    Ok(Message {
        id: MessageId::from_bytes(to_array::<16>(message_id_bytes, "message_id")?),
        sender_id: UserId::from_bytes(to_array::<16>(sender_id_bytes, "sender_id")?),
        recipient_id,
        body,
        created_at: Timestamp::from_millis(created_at as u64),
        read,
        sender_name: sender_name.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
    })
}

impl MessageStore for SqliteMessageStore {
    fn query_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, StoreError> {
        self.ensure_online()?;

        let (clause, params): (&str, Vec<&[u8]>) = match &filter {
            MessageFilter::Standard { viewer } => (
                "WHERE m.sender_id = ?1 OR m.recipient_id = ?1",
                vec![viewer.as_bytes().as_slice()],
            ),
            MessageFilter::Elevated {
                viewer,
                counterpart,
            } => (
                "WHERE m.sender_id IN (?1, ?2)",
                vec![
                    viewer.as_bytes().as_slice(),
                    counterpart.as_bytes().as_slice(),
                ],
            ),
            MessageFilter::InboundTo { viewer } => (
                "WHERE m.sender_id != ?1",
                vec![viewer.as_bytes().as_slice()],
            ),
        };

        let sql = format!("{SELECT_MESSAGE} {clause} ORDER BY m.created_at, m.message_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok(read_message(row))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row??);
        }
        Ok(messages)
    }

    fn insert_message(
        &mut self,
        sender_id: UserId,
        body: &str,
        recipient_id: Option<UserId>,
    ) -> Result<Message, StoreError> {
        self.ensure_online()?;

        let message_id = MessageId::new();
        let created_at = self.clock.now()?;

        self.conn.execute(
            "INSERT INTO messages (message_id, sender_id, recipient_id, body, created_at, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            rusqlite::params![
                message_id.as_bytes().as_slice(),
                sender_id.as_bytes().as_slice(),
                recipient_id.as_ref().map(|id| id.as_bytes().as_slice()),
                body,
                created_at.as_millis() as i64,
            ],
        )?;

        let sender_name = self
            .resolve_profile_name(sender_id)?
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        let message = Message {
            id: message_id,
            sender_id,
            recipient_id,
            body: body.to_string(),
            created_at,
            read: false,
            sender_name,
        };

        self.feed.publish(&ChangeEvent::Inserted(message.clone()));
        Ok(message)
    }

    fn mark_read(&mut self, message_id: MessageId) -> Result<bool, StoreError> {
        self.ensure_online()?;

        let sender_id: Vec<u8> = self
            .conn
            .query_row(
                "SELECT sender_id FROM messages WHERE message_id = ?1",
                [message_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound(format!("message {message_id}"))
                }
                other => StoreError::Sqlite(other),
            })?;
        let sender_id = UserId::from_bytes(to_array::<16>(sender_id, "sender_id")?);

        // The flag is monotonic: the guarded update makes repeated marks
        // no-ops that publish nothing.
        let changed = self.conn.execute(
            "UPDATE messages SET is_read = 1 WHERE message_id = ?1 AND is_read = 0",
            [message_id.as_bytes().as_slice()],
        )? > 0;

        if changed {
            self.feed.publish(&ChangeEvent::ReadMarked {
                message_id,
                sender_id,
            });
        }
        Ok(changed)
    }

    fn resolve_profile_name(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        self.ensure_online()?;

        match self.conn.query_row(
            "SELECT full_name FROM profiles WHERE user_id = ?1",
            [user_id.as_bytes().as_slice()],
            |row| row.get(0),
        ) {
            Ok(name) => Ok(Some(name)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn upsert_profile(&mut self, user_id: UserId, full_name: &str) -> Result<(), StoreError> {
        self.ensure_online()?;

        self.conn.execute(
            "INSERT INTO profiles (user_id, full_name) VALUES (?1, ?2)
             ON CONFLICT (user_id) DO UPDATE SET full_name = excluded.full_name",
            rusqlite::params![user_id.as_bytes().as_slice(), full_name],
        )?;
        Ok(())
    }

    fn subscribe(&mut self) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        Ok(self.feed.subscribe())
    }
}
