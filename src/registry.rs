use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::NamingMode;
use crate::error::ErrorKind;
use crate::types::{self, SMALLEST_USER_TYPE_ID, TypeId, WireType};

/// Hands out names for structs that arrived without one.
///
/// Names look like `Anon65_1a2b3c4d`. The hex suffix is random and never
/// issued twice by the same namer, so two anonymous structs that happen to
/// share an id in different gobs still print differently.
pub struct AnonNamer {
    issued: HashSet<String>,
    rng: Option<Box<dyn RngCore + Send>>,
}

impl AnonNamer {
    pub fn random() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            issued: HashSet::new(),
            rng: Some(Box::new(rng)),
        }
    }

    /// No suffixes at all.
    pub fn plain() -> Self {
        Self {
            issued: HashSet::new(),
            rng: None,
        }
    }

    pub fn for_mode(mode: NamingMode) -> Self {
        match mode {
            NamingMode::Random | NamingMode::Process => Self::random(),
            NamingMode::Seeded(seed) => Self::seeded(seed),
            NamingMode::Plain => Self::plain(),
        }
    }

    pub fn name_for(&mut self, id: TypeId) -> String {
        let Some(rng) = self.rng.as_mut() else {
            return format!("Anon{id}");
        };
        let mut follow = [0u8; 4];
        loop {
            rng.fill_bytes(&mut follow);
            let suffix = hex::encode(follow);
            // this shouldn't happen much
            if self.issued.insert(suffix.clone()) {
                return format!("Anon{id}_{suffix}");
            }
        }
    }
}

pub type SharedNamer = Arc<Mutex<AnonNamer>>;

lazy_static! {
    static ref PROCESS_NAMER: SharedNamer = {
        let mode = NamingMode::from_env().unwrap_or_else(|e| {
            log::warn!("{e}; using random anonymous names");
            NamingMode::Random
        });
        Arc::new(Mutex::new(AnonNamer::for_mode(mode)))
    };
}

/// The namer shared by every decoder that doesn't bring its own.
pub fn process_namer() -> SharedNamer {
    Arc::clone(&PROCESS_NAMER)
}

pub fn namer_for(mode: NamingMode) -> SharedNamer {
    match mode {
        NamingMode::Process => process_namer(),
        other => Arc::new(Mutex::new(AnonNamer::for_mode(other))),
    }
}

/// Types defined so far in the gob being decoded.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<TypeId, Arc<WireType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: TypeId) -> Option<&WireType> {
        self.types.get(&id).map(|w| w.as_ref())
    }

    /// A handle that outlives the borrow of the registry, for decoding
    /// values while more definitions may still be added.
    pub(crate) fn shared(&self, id: TypeId) -> Option<Arc<WireType>> {
        self.types.get(&id).cloned()
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains_key(&id)
    }

    /// Ids below the user range and ids already taken are both rejected.
    pub fn insert(&mut self, id: TypeId, wire: WireType) -> Result<(), ErrorKind> {
        if id < SMALLEST_USER_TYPE_ID || self.types.contains_key(&id) {
            return Err(ErrorKind::DuplicateType(id));
        }
        self.types.insert(id, Arc::new(wire));
        Ok(())
    }

    pub fn resolved_name(&self, id: TypeId) -> Result<Cow<'_, str>, ErrorKind> {
        types::type_name(&self.types, id).ok_or(ErrorKind::UnexpectedType(id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Hands the table over and leaves an empty one behind.
    pub fn take(&mut self) -> BTreeMap<TypeId, WireType> {
        std::mem::take(&mut self.types)
            .into_iter()
            .map(|(id, w)| (id, Arc::try_unwrap(w).unwrap_or_else(|w| (*w).clone())))
            .collect()
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
