//! Codec binario del stream de eventos.
//!
//! Formato de frame (orden de red, big-endian):
//! - `u32` longitud del payload (sin contar el prefijo).
//! - `u8` discriminador de tipo, `u8` acción (0=Add, 1=Remove).
//! - `[u8; 16]` event_id, `i64` occurred_at en ticks de 100 ns desde la
//!   época Unix, `i32` hash_code, `i64` sequence.
//! - Campos del payload como strings UTF-8 con prefijo de longitud `u16`.
//!
//! El codec usa el mismo paquete de stringifiers que el persister: la forma
//! binaria es la forma string, así que la biyección del stringifier es la
//! que garantiza el viaje redondo.

use uuid::Uuid;

use access_domain::DomainError;

use super::types::{datetime_from_ticks, datetime_to_ticks, AccessEvent, AccessEventKind, EventAction, EventHeader,
                   Stringifiers};

/// Error de decodificación del stream binario.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("truncated frame: needed {needed} bytes, had {remaining}")]
    Truncated { needed: usize, remaining: usize },
    #[error("unknown kind tag {0}")]
    UnknownKind(u8),
    #[error("unknown action byte {0}")]
    UnknownAction(u8),
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Stringify(#[from] DomainError),
}

const KIND_TAGS: [&str; 11] = ["user", "group", "userToGroup", "groupToGroup", "userToComponent", "groupToComponent",
                               "entityType", "entity", "userToEntity", "groupToEntity", "reconcile"];

fn kind_tag<U, G, K, A>(kind: &AccessEventKind<U, G, K, A>) -> u8 {
    let name = kind.name();
    KIND_TAGS.iter().position(|k| *k == name).expect("kind registrado") as u8
}

fn push_str(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Serializa un evento como frame binario con prefijo de longitud.
pub fn encode_event<U, G, K, A>(event: &AccessEvent<U, G, K, A>, strs: &Stringifiers<U, G, K, A>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64);
    payload.push(kind_tag(&event.kind));
    payload.push(event.header.action.as_u8());
    payload.extend_from_slice(event.header.event_id.as_bytes());
    payload.extend_from_slice(&datetime_to_ticks(&event.header.occurred_at).to_be_bytes());
    payload.extend_from_slice(&event.header.hash_code.to_be_bytes());
    payload.extend_from_slice(&event.header.sequence.to_be_bytes());

    match &event.kind {
        AccessEventKind::User { user } => push_str(&mut payload, &strs.user.to_str(user)),
        AccessEventKind::Group { group } => push_str(&mut payload, &strs.group.to_str(group)),
        AccessEventKind::UserToGroup { user, group } | AccessEventKind::Reconcile { user, group } => {
            push_str(&mut payload, &strs.user.to_str(user));
            push_str(&mut payload, &strs.group.to_str(group));
        }
        AccessEventKind::GroupToGroup { from_group, to_group } => {
            push_str(&mut payload, &strs.group.to_str(from_group));
            push_str(&mut payload, &strs.group.to_str(to_group));
        }
        AccessEventKind::UserToComponent { user, component, access } => {
            push_str(&mut payload, &strs.user.to_str(user));
            push_str(&mut payload, &strs.component.to_str(component));
            push_str(&mut payload, &strs.access.to_str(access));
        }
        AccessEventKind::GroupToComponent { group, component, access } => {
            push_str(&mut payload, &strs.group.to_str(group));
            push_str(&mut payload, &strs.component.to_str(component));
            push_str(&mut payload, &strs.access.to_str(access));
        }
        AccessEventKind::EntityType { entity_type } => push_str(&mut payload, entity_type),
        AccessEventKind::Entity { entity_type, entity } => {
            push_str(&mut payload, entity_type);
            push_str(&mut payload, entity);
        }
        AccessEventKind::UserToEntity { user, entity_type, entity } => {
            push_str(&mut payload, &strs.user.to_str(user));
            push_str(&mut payload, entity_type);
            push_str(&mut payload, entity);
        }
        AccessEventKind::GroupToEntity { group, entity_type, entity } => {
            push_str(&mut payload, &strs.group.to_str(group));
            push_str(&mut payload, entity_type);
            push_str(&mut payload, entity);
        }
    }

    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::Truncated { needed: n, remaining: self.buf.len() - self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = u16::from_be_bytes(self.take(2)?.try_into().expect("2 bytes")) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Decodifica un frame (sin el prefijo de longitud) producido por
/// `encode_event`.
pub fn decode_event<U, G, K, A>(payload: &[u8],
                                strs: &Stringifiers<U, G, K, A>)
                                -> Result<AccessEvent<U, G, K, A>, CodecError> {
    let mut r = Reader { buf: payload, pos: 0 };

    let tag = r.u8()?;
    let action = match r.u8()? {
        0 => EventAction::Add,
        1 => EventAction::Remove,
        other => return Err(CodecError::UnknownAction(other)),
    };
    let event_id = Uuid::from_bytes(r.take(16)?.try_into().expect("16 bytes"));
    let occurred_at = datetime_from_ticks(r.i64()?);
    let hash_code = r.i32()?;
    let sequence = r.i64()?;

    let kind = match KIND_TAGS.get(tag as usize).copied() {
        Some("user") => AccessEventKind::User { user: strs.user.from_str(&r.string()?)? },
        Some("group") => AccessEventKind::Group { group: strs.group.from_str(&r.string()?)? },
        Some("userToGroup") => AccessEventKind::UserToGroup { user: strs.user.from_str(&r.string()?)?,
                                                              group: strs.group.from_str(&r.string()?)? },
        Some("groupToGroup") => AccessEventKind::GroupToGroup { from_group: strs.group.from_str(&r.string()?)?,
                                                                to_group: strs.group.from_str(&r.string()?)? },
        Some("userToComponent") => AccessEventKind::UserToComponent { user: strs.user.from_str(&r.string()?)?,
                                                                      component: strs.component.from_str(&r.string()?)?,
                                                                      access: strs.access.from_str(&r.string()?)? },
        Some("groupToComponent") => {
            AccessEventKind::GroupToComponent { group: strs.group.from_str(&r.string()?)?,
                                                component: strs.component.from_str(&r.string()?)?,
                                                access: strs.access.from_str(&r.string()?)? }
        }
        Some("entityType") => AccessEventKind::EntityType { entity_type: r.string()? },
        Some("entity") => AccessEventKind::Entity { entity_type: r.string()?, entity: r.string()? },
        Some("userToEntity") => AccessEventKind::UserToEntity { user: strs.user.from_str(&r.string()?)?,
                                                                entity_type: r.string()?,
                                                                entity: r.string()? },
        Some("groupToEntity") => AccessEventKind::GroupToEntity { group: strs.group.from_str(&r.string()?)?,
                                                                  entity_type: r.string()?,
                                                                  entity: r.string()? },
        Some("reconcile") => AccessEventKind::Reconcile { user: strs.user.from_str(&r.string()?)?,
                                                          group: strs.group.from_str(&r.string()?)? },
        _ => return Err(CodecError::UnknownKind(tag)),
    };

    Ok(AccessEvent { header: EventHeader { event_id, action, occurred_at, hash_code, sequence },
                     kind })
}
