//! The plain object: a property map plus a header, the target of object
//! literals and `new`-style construction (spec.md §3 "Plain object").

use crate::object::ObjectHeader;
use crate::property_map::PropertyMap;

pub struct PlainObj {
    pub header: ObjectHeader,
    pub properties: PropertyMap,
}

impl PlainObj {
    pub fn new(header: ObjectHeader) -> Self {
        PlainObj {
            header,
            properties: PropertyMap::new(),
        }
    }
}
