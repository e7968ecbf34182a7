//! Simulated Foundation classes
//!
//! Only the methods the bridge and its tests rely on. Encodings carry
//! offsets like the ones the real runtime reports.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use nsbridge_sdk::{
    out_slot, CallResult, ForeignException, ForeignRuntime, ForeignValue, MethodSide, ObjectPtr,
};

use crate::runtime::{
    block_arg, bool_arg, cstring_arg, double_arg, int_arg, object_arg, slot_arg, struct_arg,
    Payload, SimRuntime,
};

/// `NSNotFound`
pub const NOT_FOUND: u64 = i64::MAX as u64;

fn def<F>(
    runtime: &SimRuntime,
    class: ObjectPtr,
    side: MethodSide,
    selector: &str,
    encoding: &str,
    imp: F,
) where
    F: Fn(&SimRuntime, ObjectPtr, &[ForeignValue]) -> CallResult<ForeignValue>
        + Send
        + Sync
        + 'static,
{
    runtime.add_method(class, side, selector, encoding, Arc::new(imp));
}

fn obj(ptr: ObjectPtr) -> ForeignValue {
    ForeignValue::Object(Some(ptr))
}

fn string_of(runtime: &SimRuntime, object: ObjectPtr) -> CallResult<String> {
    runtime.string_value(object).ok_or_else(|| {
        ForeignException::invalid_argument(format!("{} is not a string", runtime.describe(object)))
    })
}

fn items_of(runtime: &SimRuntime, object: ObjectPtr) -> CallResult<Vec<ObjectPtr>> {
    match runtime.payload(object) {
        Some(Payload::Array(items)) | Some(Payload::Set(items)) => Ok(items),
        Some(Payload::Dictionary(entries)) => Ok(entries.into_iter().map(|(key, _)| key).collect()),
        _ => Err(ForeignException::invalid_argument(format!(
            "{} is not a collection",
            runtime.describe(object)
        ))),
    }
}

fn required_object(args: &[ForeignValue], index: usize, what: &str) -> CallResult<ObjectPtr> {
    object_arg(args, index)?
        .ok_or_else(|| ForeignException::invalid_argument(format!("{} cannot be nil", what)))
}

fn number_of(runtime: &SimRuntime, object: ObjectPtr) -> f64 {
    match runtime.payload(object) {
        Some(Payload::Number(n)) => n,
        Some(Payload::Bool(b)) => f64::from(u8::from(b)),
        _ => 0.0,
    }
}

fn ordering_value(ordering: Option<Ordering>) -> ForeignValue {
    ForeignValue::Int(match ordering {
        Some(Ordering::Less) => -1,
        Some(Ordering::Greater) => 1,
        _ => 0,
    })
}

/// Install the Foundation classes into `runtime`
pub(crate) fn install(runtime: &SimRuntime) {
    let object = runtime.define_class("NSObject", None);
    let string = runtime.define_class("NSString", Some(object));
    let number = runtime.define_class("NSNumber", Some(object));
    runtime.define_class("__NSCFBoolean", Some(number));
    let date = runtime.define_class("NSDate", Some(object));
    let array = runtime.define_class("NSArray", Some(object));
    let mutable_array = runtime.define_class("NSMutableArray", Some(array));
    let dictionary = runtime.define_class("NSDictionary", Some(object));
    let mutable_dictionary = runtime.define_class("NSMutableDictionary", Some(dictionary));
    let set = runtime.define_class("NSSet", Some(object));
    let enumerator = runtime.define_class("NSEnumerator", Some(object));
    let error = runtime.define_class("NSError", Some(object));

    install_object(runtime, object);
    install_string(runtime, string);
    install_number(runtime, number);
    install_date(runtime, date);
    install_array(runtime, array, mutable_array);
    install_dictionary(runtime, dictionary, mutable_dictionary);
    install_set(runtime, set);
    install_enumerator(runtime, enumerator);
    install_error(runtime, error);
}

fn install_object(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "alloc", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.alloc(this, Payload::None)))
    });
    def(runtime, class, Class, "new", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.alloc(this, Payload::None)))
    });
    def(runtime, class, Class, "class", "#16@0:8", |_, this, _| {
        Ok(ForeignValue::Class(Some(this)))
    });
    def(runtime, class, Class, "description", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.new_string(rt.describe(this))?))
    });
    def(runtime, class, Instance, "init", "@16@0:8", |_, this, _| Ok(obj(this)));
    def(runtime, class, Instance, "class", "#16@0:8", |rt, this, _| {
        Ok(ForeignValue::Class(Some(rt.class_of(this))))
    });
    def(runtime, class, Instance, "description", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.new_string(rt.describe(this))?))
    });
    def(runtime, class, Instance, "isKindOfClass:", "B24@0:8#16", |rt, this, args| {
        let class = object_arg(args, 0)?;
        Ok(ForeignValue::Bool(class.is_some_and(|class| rt.is_kind_of(this, class))))
    });
    def(runtime, class, Instance, "respondsToSelector:", "B24@0:8:16", |rt, this, args| {
        match args.first() {
            Some(ForeignValue::Selector(Some(sel))) => {
                Ok(ForeignValue::Bool(rt.responds_to(this, *sel)))
            }
            Some(ForeignValue::Selector(None)) => Ok(ForeignValue::Bool(false)),
            _ => Err(ForeignException::invalid_argument("expected a selector")),
        }
    });
    def(runtime, class, Instance, "isEqual:", "B24@0:8@16", |rt, this, args| {
        let other = object_arg(args, 0)?;
        Ok(ForeignValue::Bool(other.is_some_and(|other| rt.is_equal(this, other))))
    });
    def(runtime, class, Instance, "hash", "Q16@0:8", |_, this, _| {
        Ok(ForeignValue::UInt(this.addr() as u64))
    });
}

fn install_string(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "stringWithUTF8String:", "@24@0:8r*16", |rt, this, args| {
        let text = cstring_arg(args, 0)?
            .ok_or_else(|| ForeignException::invalid_argument("NULL cString"))?;
        Ok(obj(rt.alloc(this, Payload::String(text))))
    });
    def(runtime, class, Class, "stringWithString:", "@24@0:8@16", |rt, this, args| {
        let source = required_object(args, 0, "string")?;
        Ok(obj(rt.alloc(this, Payload::String(string_of(rt, source)?))))
    });
    def(runtime, class, Instance, "UTF8String", "r*16@0:8", |rt, this, _| {
        Ok(ForeignValue::CString(rt.string_value(this)))
    });
    def(runtime, class, Instance, "description", "@16@0:8", |_, this, _| Ok(obj(this)));
    def(runtime, class, Instance, "length", "Q16@0:8", |rt, this, _| {
        Ok(ForeignValue::UInt(string_of(rt, this)?.chars().count() as u64))
    });
    def(runtime, class, Instance, "uppercaseString", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.new_string(string_of(rt, this)?.to_uppercase())?))
    });
    def(runtime, class, Instance, "stringByAppendingString:", "@24@0:8@16", |rt, this, args| {
        let suffix = string_of(rt, required_object(args, 0, "string")?)?;
        Ok(obj(rt.new_string(string_of(rt, this)? + &suffix)?))
    });
    def(runtime, class, Instance, "isEqualToString:", "B24@0:8@16", |rt, this, args| {
        let other = object_arg(args, 0)?.and_then(|other| rt.string_value(other));
        Ok(ForeignValue::Bool(other.is_some() && other == rt.string_value(this)))
    });
    def(runtime, class, Instance, "compare:", "q24@0:8@16", |rt, this, args| {
        let other = string_of(rt, required_object(args, 0, "string")?)?;
        Ok(ordering_value(Some(string_of(rt, this)?.cmp(&other))))
    });
    def(
        runtime,
        class,
        Instance,
        "substringWithRange:",
        "@32@0:8{_NSRange=QQ}16",
        |rt, this, args| {
            let range = struct_arg(args, 0)?;
            let (location, length) = match range.as_slice() {
                [location, length] => (
                    location.as_u64().unwrap_or_default(),
                    length.as_u64().unwrap_or_default(),
                ),
                _ => return Err(ForeignException::invalid_argument("expected an NSRange")),
            };
            let chars: Vec<char> = string_of(rt, this)?.chars().collect();
            let bounds = location
                .checked_add(length)
                .and_then(|end| usize::try_from(end).ok())
                .filter(|end| *end <= chars.len())
                .map(|end| (end - length as usize, end));
            let Some((start, end)) = bounds else {
                return Err(ForeignException::new(
                    "NSRangeException",
                    format!(
                        "Range {{{}, {}}} out of bounds; string length {}",
                        location,
                        length,
                        chars.len()
                    ),
                ));
            };
            let substring: String = chars[start..end].iter().collect();
            Ok(obj(rt.new_string(substring)?))
        },
    );
    def(runtime, class, Instance, "rangeOfString:", "{_NSRange=QQ}24@0:8@16", |rt, this, args| {
        let needle = string_of(rt, required_object(args, 0, "string")?)?;
        let haystack = string_of(rt, this)?;
        let (location, length) = match haystack.find(&needle) {
            Some(byte_index) if !needle.is_empty() => (
                haystack[..byte_index].chars().count() as u64,
                needle.chars().count() as u64,
            ),
            _ => (NOT_FOUND, 0),
        };
        Ok(ForeignValue::Struct(vec![ForeignValue::UInt(location), ForeignValue::UInt(length)]))
    });
    def(
        runtime,
        class,
        Instance,
        "writeToFile:atomically:encoding:error:",
        "B44@0:8@16B24Q28^@36",
        |rt, _, args| {
            let path = string_of(rt, required_object(args, 0, "path")?)?;
            bool_arg(args, 1)?;
            int_arg(args, 2)?;
            if path.starts_with("/tmp/") {
                return Ok(ForeignValue::Bool(true));
            }
            if let Some(slot) = slot_arg(args, 3)? {
                *slot.lock() = obj(rt.new_error("NSCocoaErrorDomain", 4)?);
            }
            Ok(ForeignValue::Bool(false))
        },
    );
}

fn install_number(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "numberWithDouble:", "@24@0:8d16", |rt, this, args| {
        Ok(obj(rt.alloc(this, Payload::Number(double_arg(args, 0)?))))
    });
    def(runtime, class, Class, "numberWithInt:", "@20@0:8i16", |rt, this, args| {
        Ok(obj(rt.alloc(this, Payload::Number(int_arg(args, 0)? as f64))))
    });
    def(runtime, class, Class, "numberWithLongLong:", "@24@0:8q16", |rt, this, args| {
        Ok(obj(rt.alloc(this, Payload::Number(int_arg(args, 0)? as f64))))
    });
    def(runtime, class, Class, "numberWithBool:", "@20@0:8c16", |rt, _, args| {
        Ok(obj(rt.boolean(bool_arg(args, 0)?)?))
    });
    def(runtime, class, Instance, "doubleValue", "d16@0:8", |rt, this, _| {
        Ok(ForeignValue::Double(number_of(rt, this)))
    });
    def(runtime, class, Instance, "intValue", "i16@0:8", |rt, this, _| {
        Ok(ForeignValue::Int(number_of(rt, this) as i32 as i64))
    });
    def(runtime, class, Instance, "longLongValue", "q16@0:8", |rt, this, _| {
        Ok(ForeignValue::Int(number_of(rt, this) as i64))
    });
    def(runtime, class, Instance, "boolValue", "c16@0:8", |rt, this, _| {
        Ok(ForeignValue::Int(i64::from(number_of(rt, this) != 0.0)))
    });
    def(runtime, class, Instance, "stringValue", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.new_string(rt.describe(this))?))
    });
    def(runtime, class, Instance, "compare:", "q24@0:8@16", |rt, this, args| {
        let other = required_object(args, 0, "number")?;
        Ok(ordering_value(number_of(rt, this).partial_cmp(&number_of(rt, other))))
    });
}

fn install_date(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "date", "@16@0:8", |rt, this, _| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |elapsed| elapsed.as_secs_f64());
        Ok(obj(rt.alloc(this, Payload::Date(now))))
    });
    def(runtime, class, Class, "dateWithTimeIntervalSince1970:", "@24@0:8d16", |rt, this, args| {
        Ok(obj(rt.alloc(this, Payload::Date(double_arg(args, 0)?))))
    });
    def(runtime, class, Instance, "timeIntervalSince1970", "d16@0:8", |rt, this, _| {
        match rt.payload(this) {
            Some(Payload::Date(secs)) => Ok(ForeignValue::Double(secs)),
            _ => Err(ForeignException::invalid_argument("not a date")),
        }
    });
    def(runtime, class, Instance, "dateByAddingTimeInterval:", "@24@0:8d16", |rt, this, args| {
        let secs = match rt.payload(this) {
            Some(Payload::Date(secs)) => secs,
            _ => return Err(ForeignException::invalid_argument("not a date")),
        };
        Ok(obj(rt.instantiate("NSDate", Payload::Date(secs + double_arg(args, 0)?))?))
    });
}

fn install_array(runtime: &SimRuntime, class: ObjectPtr, mutable: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "array", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.alloc(this, Payload::Array(Vec::new()))))
    });
    def(runtime, class, Class, "arrayWithObject:", "@24@0:8@16", |rt, this, args| {
        let item = required_object(args, 0, "object")?;
        Ok(obj(rt.alloc(this, Payload::Array(vec![item]))))
    });
    def(runtime, class, Instance, "count", "Q16@0:8", |rt, this, _| {
        Ok(ForeignValue::UInt(items_of(rt, this)?.len() as u64))
    });
    def(runtime, class, Instance, "objectAtIndex:", "@24@0:8Q16", |rt, this, args| {
        let index = int_arg(args, 0)?;
        let items = items_of(rt, this)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| items.get(index).copied())
            .map(obj)
            .ok_or_else(|| {
                ForeignException::new(
                    "NSRangeException",
                    format!(
                        "index {} beyond bounds [0 .. {}]",
                        index,
                        items.len().saturating_sub(1)
                    ),
                )
            })
    });
    def(runtime, class, Instance, "firstObject", "@16@0:8", |rt, this, _| {
        Ok(ForeignValue::Object(items_of(rt, this)?.first().copied()))
    });
    def(runtime, class, Instance, "containsObject:", "B24@0:8@16", |rt, this, args| {
        let needle = object_arg(args, 0)?;
        let items = items_of(rt, this)?;
        Ok(ForeignValue::Bool(
            needle.is_some_and(|needle| items.iter().any(|item| rt.is_equal(*item, needle))),
        ))
    });
    def(runtime, class, Instance, "objectEnumerator", "@16@0:8", |rt, this, _| {
        let items = items_of(rt, this)?;
        Ok(obj(rt.instantiate("NSEnumerator", Payload::Enumerator { items, position: 0 })?))
    });
    def(runtime, class, Instance, "enumerateObjectsUsingBlock:", "v24@0:8@?16", |rt, this, args| {
        let block = block_arg(args, 0)?;
        for (index, item) in items_of(rt, this)?.into_iter().enumerate() {
            let stop = out_slot(ForeignValue::Bool(false));
            rt.call_block(
                block.as_ref(),
                &[
                    ForeignValue::Block(block.clone()),
                    obj(item),
                    ForeignValue::UInt(index as u64),
                    ForeignValue::Reference(Arc::clone(&stop)),
                ],
            )?;
            if stop.lock().as_bool() == Some(true) {
                break;
            }
        }
        Ok(ForeignValue::Void)
    });
    def(runtime, class, Instance, "sortedArrayUsingComparator:", "@24@0:8@?16", |rt, this, args| {
        let block = block_arg(args, 0)?;
        let mut sorted: Vec<ObjectPtr> = Vec::new();
        for item in items_of(rt, this)? {
            let mut position = sorted.len();
            while position > 0 {
                let order = rt
                    .call_block(
                        block.as_ref(),
                        &[ForeignValue::Block(block.clone()), obj(sorted[position - 1]), obj(item)],
                    )?
                    .as_i64()
                    .unwrap_or_default();
                if order <= 0 {
                    break;
                }
                position -= 1;
            }
            sorted.insert(position, item);
        }
        Ok(obj(rt.instantiate("NSArray", Payload::Array(sorted))?))
    });

    def(runtime, mutable, Instance, "addObject:", "v24@0:8@16", |rt, this, args| {
        let item = required_object(args, 0, "object")?;
        rt.with_payload(this, |payload| match payload {
            Payload::Array(items) => {
                items.push(item);
                Ok(ForeignValue::Void)
            }
            _ => Err(ForeignException::invalid_argument("not a mutable array")),
        })
        .unwrap_or_else(|| Err(ForeignException::invalid_argument("not an instance")))
    });
}

fn install_dictionary(runtime: &SimRuntime, class: ObjectPtr, mutable: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "dictionary", "@16@0:8", |rt, this, _| {
        Ok(obj(rt.alloc(this, Payload::Dictionary(Vec::new()))))
    });
    def(runtime, class, Instance, "count", "Q16@0:8", |rt, this, _| {
        Ok(ForeignValue::UInt(items_of(rt, this)?.len() as u64))
    });
    def(runtime, class, Instance, "objectForKey:", "@24@0:8@16", |rt, this, args| {
        let key = object_arg(args, 0)?;
        let entries = match rt.payload(this) {
            Some(Payload::Dictionary(entries)) => entries,
            _ => return Err(ForeignException::invalid_argument("not a dictionary")),
        };
        Ok(ForeignValue::Object(key.and_then(|key| {
            entries
                .iter()
                .find(|(candidate, _)| rt.is_equal(*candidate, key))
                .map(|(_, value)| *value)
        })))
    });
    def(runtime, class, Instance, "keyEnumerator", "@16@0:8", |rt, this, _| {
        let items = items_of(rt, this)?;
        Ok(obj(rt.instantiate("NSEnumerator", Payload::Enumerator { items, position: 0 })?))
    });
    def(runtime, class, Instance, "allKeys", "@16@0:8", |rt, this, _| {
        let keys = items_of(rt, this)?;
        Ok(obj(rt.instantiate("NSArray", Payload::Array(keys))?))
    });

    def(runtime, mutable, Instance, "setObject:forKey:", "v32@0:8@16@24", |rt, this, args| {
        let value = required_object(args, 0, "object")?;
        let key = required_object(args, 1, "key")?;
        let existing = match rt.payload(this) {
            Some(Payload::Dictionary(entries)) => entries
                .iter()
                .position(|(candidate, _)| rt.is_equal(*candidate, key)),
            _ => return Err(ForeignException::invalid_argument("not a mutable dictionary")),
        };
        rt.with_payload(this, |payload| {
            if let Payload::Dictionary(entries) = payload {
                match existing {
                    Some(index) => entries[index].1 = value,
                    None => entries.push((key, value)),
                }
            }
        });
        Ok(ForeignValue::Void)
    });
}

fn install_set(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(runtime, class, Class, "setWithArray:", "@24@0:8@16", |rt, this, args| {
        let mut unique: Vec<ObjectPtr> = Vec::new();
        for item in items_of(rt, required_object(args, 0, "array")?)? {
            if !unique.iter().any(|existing| rt.is_equal(*existing, item)) {
                unique.push(item);
            }
        }
        Ok(obj(rt.alloc(this, Payload::Set(unique))))
    });
    def(runtime, class, Instance, "count", "Q16@0:8", |rt, this, _| {
        Ok(ForeignValue::UInt(items_of(rt, this)?.len() as u64))
    });
    def(runtime, class, Instance, "objectEnumerator", "@16@0:8", |rt, this, _| {
        let items = items_of(rt, this)?;
        Ok(obj(rt.instantiate("NSEnumerator", Payload::Enumerator { items, position: 0 })?))
    });
}

fn install_enumerator(runtime: &SimRuntime, class: ObjectPtr) {
    def(runtime, class, MethodSide::Instance, "nextObject", "@16@0:8", |rt, this, _| {
        let next = rt
            .with_payload(this, |payload| match payload {
                Payload::Enumerator { items, position } => {
                    let item = items.get(*position).copied();
                    if item.is_some() {
                        *position += 1;
                    }
                    item
                }
                _ => None,
            })
            .flatten();
        Ok(ForeignValue::Object(next))
    });
}

fn install_error(runtime: &SimRuntime, class: ObjectPtr) {
    use MethodSide::{Class, Instance};

    def(
        runtime,
        class,
        Class,
        "errorWithDomain:code:userInfo:",
        "@40@0:8@16q24@32",
        |rt, this, args| {
            let domain = string_of(rt, required_object(args, 0, "domain")?)?;
            let code = int_arg(args, 1)?;
            Ok(obj(rt.alloc(this, Payload::Error { domain, code })))
        },
    );
    def(runtime, class, Instance, "domain", "@16@0:8", |rt, this, _| match rt.payload(this) {
        Some(Payload::Error { domain, .. }) => Ok(obj(rt.new_string(domain)?)),
        _ => Err(ForeignException::invalid_argument("not an error")),
    });
    def(runtime, class, Instance, "code", "q16@0:8", |rt, this, _| match rt.payload(this) {
        Some(Payload::Error { code, .. }) => Ok(ForeignValue::Int(code)),
        _ => Err(ForeignException::invalid_argument("not an error")),
    });
    def(runtime, class, Instance, "localizedDescription", "@16@0:8", |rt, this, _| {
        match rt.payload(this) {
            Some(Payload::Error { domain, code }) => Ok(obj(rt.new_string(format!(
                "The operation couldn't be completed. ({} error {}.)",
                domain, code
            ))?)),
            _ => Err(ForeignException::invalid_argument("not an error")),
        }
    });
}
