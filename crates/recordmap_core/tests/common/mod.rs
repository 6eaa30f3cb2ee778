#![allow(dead_code)]

use recordmap_core::{
    integer_field, optional_text_field, text_field, DecodeError, FromRecord, InMemoryStore,
    Mappable, Predicate, Record, RelatedModels,
};

pub const ENTITIES: &[&str] = &["Person", "Address", "Note", "Level", "Tag"];

pub fn memory_store() -> InMemoryStore {
    InMemoryStore::with_entities(ENTITIES).unwrap()
}

/// Person deduplicated by email, owning addresses and tags.
pub struct Person {
    pub email: String,
    pub name: String,
    pub addresses: Vec<Address>,
    pub tags: Vec<Tag>,
}

impl Person {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            addresses: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_address(mut self, city: &str) -> Self {
        self.addresses.push(Address::new(&self.email, city));
        self
    }

    pub fn with_tag(mut self, label: &str) -> Self {
        self.tags.push(Tag::new(&self.email, label));
        self
    }
}

impl Mappable for Person {
    fn entity_type(&self) -> Option<&str> {
        Some("Person")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("email", self.email.as_str()))
    }

    fn populate(&self, record: &mut Record) {
        record
            .set("email", self.email.as_str())
            .set("name", self.name.as_str());
    }

    fn related_models(&self) -> RelatedModels<'_> {
        let addresses = self
            .addresses
            .iter()
            .map(|address| Box::new(address) as Box<dyn Mappable + '_>)
            .collect();
        let tags = self
            .tags
            .iter()
            .map(|tag| Box::new(tag) as Box<dyn Mappable + '_>)
            .collect();
        vec![addresses, tags]
    }
}

/// Address linked to its owner through `owner_email`.
pub struct Address {
    pub owner_email: String,
    pub city: String,
}

impl Address {
    pub fn new(owner_email: &str, city: &str) -> Self {
        Self {
            owner_email: owner_email.to_string(),
            city: city.to_string(),
        }
    }
}

impl Mappable for Address {
    fn entity_type(&self) -> Option<&str> {
        Some("Address")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(
            Predicate::eq("owner_email", self.owner_email.as_str())
                .and(Predicate::eq("city", self.city.as_str())),
        )
    }

    fn populate(&self, record: &mut Record) {
        record
            .set("owner_email", self.owner_email.as_str())
            .set("city", self.city.as_str());
    }
}

pub struct Tag {
    pub owner_email: String,
    pub label: String,
}

impl Tag {
    pub fn new(owner_email: &str, label: &str) -> Self {
        Self {
            owner_email: owner_email.to_string(),
            label: label.to_string(),
        }
    }
}

impl Mappable for Tag {
    fn entity_type(&self) -> Option<&str> {
        Some("Tag")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(
            Predicate::eq("owner_email", self.owner_email.as_str())
                .and(Predicate::eq("label", self.label.as_str())),
        )
    }

    fn populate(&self, record: &mut Record) {
        record
            .set("owner_email", self.owner_email.as_str())
            .set("label", self.label.as_str());
    }
}

/// Free-form note without a uniqueness predicate.
pub struct Note {
    pub text: String,
}

impl Mappable for Note {
    fn entity_type(&self) -> Option<&str> {
        Some("Note")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        None
    }

    fn populate(&self, record: &mut Record) {
        record.set("text", self.text.as_str());
    }
}

/// Self-nesting model producing one `Level` record per depth.
pub struct Level {
    pub level: i64,
    pub deepest: i64,
}

impl Mappable for Level {
    fn entity_type(&self) -> Option<&str> {
        Some("Level")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("level", self.level))
    }

    fn populate(&self, record: &mut Record) {
        record.set("level", self.level);
        if self.level > 0 {
            record.set("parent_level", self.level - 1);
        }
    }

    fn related_models(&self) -> RelatedModels<'_> {
        if self.level >= self.deepest {
            return Vec::new();
        }
        let child: Box<dyn Mappable> = Box::new(Level {
            level: self.level + 1,
            deepest: self.deepest,
        });
        vec![vec![child]]
    }
}

/// Model naming an entity type no store registers.
pub struct Ghost;

impl Mappable for Ghost {
    fn entity_type(&self) -> Option<&str> {
        Some("Ghost")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("id", 1))
    }

    fn populate(&self, record: &mut Record) {
        record.set("id", 1);
    }
}

/// Relationship-only wrapper with no record of its own.
pub struct Decoration {
    pub notes: Vec<Note>,
}

impl Mappable for Decoration {
    fn entity_type(&self) -> Option<&str> {
        None
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        None
    }

    fn populate(&self, _record: &mut Record) {}

    fn related_models(&self) -> RelatedModels<'_> {
        vec![self
            .notes
            .iter()
            .map(|note| Box::new(note) as Box<dyn Mappable + '_>)
            .collect()]
    }
}

/// Typed view over `Person` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRow {
    pub email: String,
    pub name: String,
    pub nickname: Option<String>,
}

impl FromRecord for PersonRow {
    const ENTITY: &'static str = "Person";

    fn from_record(record: &Record) -> Result<Self, DecodeError> {
        Ok(Self {
            email: text_field(record, "email")?,
            name: text_field(record, "name")?,
            nickname: optional_text_field(record, "nickname")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRow {
    pub level: i64,
}

impl FromRecord for LevelRow {
    const ENTITY: &'static str = "Level";

    fn from_record(record: &Record) -> Result<Self, DecodeError> {
        Ok(Self {
            level: integer_field(record, "level")?,
        })
    }
}
