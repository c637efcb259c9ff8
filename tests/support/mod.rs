//! Shared fixture types for the integration tests: hand-written `Describable`
//! impls the way a derive macro would generate them, covering a plain
//! record, an optional field, `PArray`/`Vec` containers, a map field, and a
//! sealed interface with two implementing records.

#![allow(dead_code)]

use std::collections::HashMap;

use schema_pickle::descriptor::{
    EnumDescriptor, FieldDescriptor, InterfaceDescriptor, RecordDescriptor,
};
use schema_pickle::{
    ArrayValue, CallError, Describable, PArray, Schematic, UserTypeDescriptor, UserTypeKind, Value,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Describable for Point {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Point",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "x", type_desc: i32::type_desc() },
                    FieldDescriptor { name: "y", type_desc: i32::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record("pickler::Point", vec![Value::Int(self.x), Value::Int(self.y)])
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let y = fields.pop().unwrap();
                let x = fields.pop().unwrap();
                match (x, y) {
                    (Value::Int(x), Value::Int(y)) => Ok(Point { x, y }),
                    _ => Err(CallError::SchemaMismatch("expected two int fields")),
                }
            }
            _ => Err(CallError::SchemaMismatch("expected Point record")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub nickname: Option<String>,
}

impl Describable for Profile {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Profile",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "name", type_desc: String::type_desc() },
                    FieldDescriptor { name: "nickname", type_desc: Option::<String>::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(
            "pickler::Profile",
            vec![
                Value::Str(self.name.clone()),
                Value::Optional(self.nickname.clone().map(|n| Box::new(Value::Str(n)))),
            ],
        )
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let nickname = fields.pop().unwrap();
                let name = fields.pop().unwrap();
                let name = match name {
                    Value::Str(s) => s,
                    _ => return Err(CallError::SchemaMismatch("expected string name")),
                };
                let nickname = match nickname {
                    Value::Optional(None) => None,
                    Value::Optional(Some(boxed)) => match *boxed {
                        Value::Str(s) => Some(s),
                        _ => return Err(CallError::SchemaMismatch("expected string nickname")),
                    },
                    _ => return Err(CallError::SchemaMismatch("expected optional nickname")),
                };
                Ok(Profile { name, nickname })
            }
            _ => Err(CallError::SchemaMismatch("expected Profile record")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub values: PArray<i32>,
    pub tags: Vec<String>,
}

impl Describable for Matrix {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Matrix",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "values", type_desc: PArray::<i32>::type_desc() },
                    FieldDescriptor { name: "tags", type_desc: Vec::<String>::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(
            "pickler::Matrix",
            vec![
                Value::Array(ArrayValue::Ints(self.values.0.clone())),
                Value::List(self.tags.iter().cloned().map(Value::Str).collect()),
            ],
        )
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let tags = fields.pop().unwrap();
                let values = fields.pop().unwrap();
                let values = match values {
                    Value::Array(ArrayValue::Ints(v)) => PArray(v),
                    _ => return Err(CallError::SchemaMismatch("expected int array")),
                };
                let tags = match tags {
                    Value::List(items) => items
                        .into_iter()
                        .map(|v| match v {
                            Value::Str(s) => Ok(s),
                            _ => Err(CallError::SchemaMismatch("expected string tag")),
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(CallError::SchemaMismatch("expected tag list")),
                };
                Ok(Matrix { values, tags })
            }
            _ => Err(CallError::SchemaMismatch("expected Matrix record")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    pub counts: HashMap<String, i32>,
}

impl Describable for Registry {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Registry",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![FieldDescriptor {
                    name: "counts",
                    type_desc: HashMap::<String, i32>::type_desc(),
                }],
            }),
        }
    }

    fn to_value(&self) -> Value {
        let pairs = self
            .counts
            .iter()
            .map(|(k, v)| (Value::Str(k.clone()), Value::Int(*v)))
            .collect();
        Value::Record("pickler::Registry", vec![Value::Map(pairs)])
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 1 => match fields.remove(0) {
                Value::Map(pairs) => {
                    let mut counts = HashMap::new();
                    for (k, v) in pairs {
                        let k = match k {
                            Value::Str(s) => s,
                            _ => return Err(CallError::SchemaMismatch("expected string key")),
                        };
                        let v = match v {
                            Value::Int(n) => n,
                            _ => return Err(CallError::SchemaMismatch("expected int value")),
                        };
                        counts.insert(k, v);
                    }
                    Ok(Registry { counts })
                }
                _ => Err(CallError::SchemaMismatch("expected map")),
            },
            _ => Err(CallError::SchemaMismatch("expected Registry record")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

const SUIT_VARIANTS: [&str; 4] = ["Clubs", "Diamonds", "Hearts", "Spades"];

impl Describable for Suit {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Suit",
            kind: UserTypeKind::Enum(EnumDescriptor {
                variants: SUIT_VARIANTS.to_vec(),
            }),
        }
    }

    fn to_value(&self) -> Value {
        let index = *self as u32;
        Value::EnumVariant("pickler::Suit", index)
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::EnumVariant(_, 0) => Ok(Suit::Clubs),
            Value::EnumVariant(_, 1) => Ok(Suit::Diamonds),
            Value::EnumVariant(_, 2) => Ok(Suit::Hearts),
            Value::EnumVariant(_, 3) => Ok(Suit::Spades),
            Value::EnumVariant(_, _) => Err(CallError::SchemaMismatch("unknown suit variant")),
            _ => Err(CallError::SchemaMismatch("expected enum value")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dog {
    pub name: String,
    pub breed: String,
}

impl Describable for Dog {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Dog",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "name", type_desc: String::type_desc() },
                    FieldDescriptor { name: "breed", type_desc: String::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(
            "pickler::Dog",
            vec![Value::Str(self.name.clone()), Value::Str(self.breed.clone())],
        )
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let breed = fields.pop().unwrap();
                let name = fields.pop().unwrap();
                match (name, breed) {
                    (Value::Str(name), Value::Str(breed)) => Ok(Dog { name, breed }),
                    _ => Err(CallError::SchemaMismatch("expected two string fields")),
                }
            }
            _ => Err(CallError::SchemaMismatch("expected Dog record")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eagle {
    pub name: String,
    pub wingspan_cm: i32,
}

impl Describable for Eagle {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Eagle",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "name", type_desc: String::type_desc() },
                    FieldDescriptor { name: "wingspan_cm", type_desc: i32::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(
            "pickler::Eagle",
            vec![Value::Str(self.name.clone()), Value::Int(self.wingspan_cm)],
        )
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let wingspan = fields.pop().unwrap();
                let name = fields.pop().unwrap();
                match (name, wingspan) {
                    (Value::Str(name), Value::Int(wingspan_cm)) => {
                        Ok(Eagle { name, wingspan_cm })
                    }
                    _ => Err(CallError::SchemaMismatch("expected name and wingspan fields")),
                }
            }
            _ => Err(CallError::SchemaMismatch("expected Eagle record")),
        }
    }
}

/// A sealed interface with two implementing records. Unlike `Dog`/`Eagle`,
/// which are plain records, `Animal` never writes its own marker: only the
/// concrete variant's schema ordinal goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Animal {
    Dog(Dog),
    Eagle(Eagle),
}

impl Describable for Animal {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Animal",
            kind: UserTypeKind::Interface(InterfaceDescriptor {
                variants: vec![Dog::descriptor, Eagle::descriptor],
            }),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Animal::Dog(dog) => dog.to_value(),
            Animal::Eagle(eagle) => eagle.to_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match &value {
            Value::Record(name, _) => match *name {
                "pickler::Dog" => Ok(Animal::Dog(Dog::from_value(value)?)),
                "pickler::Eagle" => Ok(Animal::Eagle(Eagle::from_value(value)?)),
                _ => Err(CallError::SchemaMismatch("unknown animal variant")),
            },
            _ => Err(CallError::SchemaMismatch("expected a record value")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub at: String,
    pub animal: Animal,
}

impl Describable for Sighting {
    fn descriptor() -> UserTypeDescriptor {
        UserTypeDescriptor {
            name: "pickler::Sighting",
            kind: UserTypeKind::Record(RecordDescriptor {
                fields: vec![
                    FieldDescriptor { name: "at", type_desc: String::type_desc() },
                    FieldDescriptor { name: "animal", type_desc: Animal::type_desc() },
                ],
            }),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(
            "pickler::Sighting",
            vec![Value::Str(self.at.clone()), self.animal.to_value()],
        )
    }

    fn from_value(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Record(_, mut fields) if fields.len() == 2 => {
                let animal = fields.pop().unwrap();
                let at = fields.pop().unwrap();
                match at {
                    Value::Str(at) => Ok(Sighting { at, animal: Animal::from_value(animal)? }),
                    _ => Err(CallError::SchemaMismatch("expected string location")),
                }
            }
            _ => Err(CallError::SchemaMismatch("expected Sighting record")),
        }
    }
}
