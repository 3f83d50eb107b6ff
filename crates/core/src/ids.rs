use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// A RecordId identifies one row of a versioned table. The head row of a
// branch has id == branch, so a RecordId doubles as the branch identity.
uuid_id!(RecordId);

uuid_id!(UserId);
uuid_id!(PromptId);
uuid_id!(AnswerId);
uuid_id!(QuestionId);
uuid_id!(CategoryId);
uuid_id!(CoopCategoryId);
uuid_id!(ContactId);
uuid_id!(LabelId);
uuid_id!(EmailId);
uuid_id!(PhoneId);
uuid_id!(PictureId);
uuid_id!(RelationshipTypeId);
