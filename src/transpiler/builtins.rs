//! Builtin function registry.
//!
//! Maps source-level names (`sha256`, `Math.max`, `list.includes`, ...) to their
//! target spelling and the module that has to be imported for them. The table is
//! static; the set of import groups actually referenced is owned by each
//! [`BuiltinRegistry`] value, so a fresh registry per compilation never carries
//! imports over from a previous file.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Called as `target(args)`.
    Function,
    /// Called on a receiver; the receiver becomes the first argument.
    Method,
    /// A type name that only needs importing.
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinMapping {
    pub target: &'static str,
    pub import_group: Option<&'static str>,
    pub kind: MappingKind,
}

const LIST: &str = "aiken/collection/list";
const DICT: &str = "aiken/collection/dict";
const PAIRS: &str = "aiken/collection/pairs";
const OPTION: &str = "aiken/option";
const BYTES: &str = "aiken/primitive/bytearray";
const STRING: &str = "aiken/primitive/string";
const INT: &str = "aiken/primitive/int";
const MATH: &str = "aiken/math";
const RATIONAL: &str = "aiken/math/rational";
const CRYPTO: &str = "aiken/crypto";
const INTERVAL: &str = "aiken/interval";
const CBOR: &str = "aiken/cbor";
const BUILTIN: &str = "aiken/builtin";
const TRANSACTION: &str = "cardano/transaction";
const ASSETS: &str = "cardano/assets";
const ADDRESS: &str = "cardano/address";
const CERTIFICATE: &str = "cardano/certificate";

type Entry = (&'static str, &'static str);

const LIST_FUNCTIONS: &[Entry] = &[
    ("list.includes", "list.has"),
    ("list.has", "list.has"),
    ("list.map", "list.map"),
    ("list.filter", "list.filter"),
    ("list.filterMap", "list.filter_map"),
    ("list.flatMap", "list.flat_map"),
    ("list.some", "list.any"),
    ("list.any", "list.any"),
    ("list.every", "list.all"),
    ("list.all", "list.all"),
    ("list.find", "list.find"),
    ("list.findIndex", "list.index_of"),
    ("list.indexOf", "list.index_of"),
    ("list.length", "list.length"),
    ("list.count", "list.count"),
    ("list.concat", "list.concat"),
    ("list.reverse", "list.reverse"),
    ("list.slice", "list.slice"),
    ("list.at", "list.at"),
    ("list.head", "list.head"),
    ("list.tail", "list.tail"),
    ("list.last", "list.last"),
    ("list.init", "list.init"),
    ("list.push", "list.push"),
    ("list.unshift", "list.push"),
    ("list.take", "list.take"),
    ("list.drop", "list.drop"),
    ("list.takeWhile", "list.take_while"),
    ("list.dropWhile", "list.drop_while"),
    ("list.span", "list.span"),
    ("list.partition", "list.partition"),
    ("list.sort", "list.sort"),
    ("list.unique", "list.unique"),
    ("list.zip", "list.zip"),
    ("list.unzip", "list.unzip"),
    ("list.range", "list.range"),
    ("list.repeat", "list.repeat"),
    ("list.isEmpty", "list.is_empty"),
    ("list.reduce", "list.reduce"),
    ("list.foldl", "list.foldl"),
    ("list.foldr", "list.foldr"),
    ("list.forEach", "list.for_each"),
    ("list.flatten", "list.flatten"),
    ("list.flat", "list.flatten"),
    ("list.sum", "list.foldl"),
    ("list.delete", "list.delete"),
    ("list.difference", "list.difference"),
    ("list.union", "list.union"),
    ("list.indexedMap", "list.indexed_map"),
    ("list.mapTwo", "list.map2"),
    ("list.and", "list.and"),
    ("list.or", "list.or"),
    ("list.filterNone", "list.filter_map"),
];

const DICT_FUNCTIONS: &[Entry] = &[
    ("dict.get", "dict.get"),
    ("dict.has", "dict.has_key"),
    ("dict.hasKey", "dict.has_key"),
    ("dict.set", "dict.insert"),
    ("dict.insert", "dict.insert"),
    ("dict.delete", "dict.delete"),
    ("dict.keys", "dict.keys"),
    ("dict.values", "dict.values"),
    ("dict.size", "dict.size"),
    ("dict.isEmpty", "dict.is_empty"),
    ("dict.empty", "dict.empty"),
    ("dict.fromEntries", "dict.from_pairs"),
    ("dict.fromPairs", "dict.from_pairs"),
    ("dict.entries", "dict.to_pairs"),
    ("dict.toPairs", "dict.to_pairs"),
    ("dict.filter", "dict.filter"),
    ("dict.map", "dict.map"),
    ("dict.foldl", "dict.foldl"),
    ("dict.foldr", "dict.foldr"),
    ("dict.union", "dict.union"),
    ("dict.unionWith", "dict.union_with"),
    ("dict.find", "dict.find"),
];

const PAIRS_FUNCTIONS: &[Entry] = &[
    ("pairs.get", "pairs.get_first"),
    ("pairs.getFirst", "pairs.get_first"),
    ("pairs.getAll", "pairs.get_all"),
    ("pairs.has", "pairs.has_key"),
    ("pairs.hasKey", "pairs.has_key"),
    ("pairs.keys", "pairs.keys"),
    ("pairs.values", "pairs.values"),
    ("pairs.insert", "pairs.insert_by_ascending_key"),
    ("pairs.delete", "pairs.delete_first"),
    ("pairs.deleteAll", "pairs.delete_all"),
    ("pairs.findFirst", "pairs.find_first"),
    ("pairs.map", "pairs.map"),
    ("pairs.foldl", "pairs.foldl"),
    ("pairs.foldr", "pairs.foldr"),
];

const OPTION_FUNCTIONS: &[Entry] = &[
    ("option.isSome", "option.is_some"),
    ("option.isNone", "option.is_none"),
    ("option.map", "option.map"),
    ("option.andThen", "option.and_then"),
    ("option.flatMap", "option.and_then"),
    ("option.or", "option.or_else"),
    ("option.orElse", "option.or_else"),
    ("option.orTry", "option.or_try"),
    ("option.unwrapOr", "option.or_else"),
    ("option.choice", "option.choice"),
    ("option.flatten", "option.flatten"),
    ("option.filter", "option.filter"),
    ("option.mapTwo", "option.map2"),
];

const BYTEARRAY_FUNCTIONS: &[Entry] = &[
    ("bytearray.from", "bytearray.from_string"),
    ("bytearray.fromString", "bytearray.from_string"),
    ("bytearray.fromHex", "bytearray.from_string"),
    ("bytearray.fromInt", "bytearray.from_int_big_endian"),
    ("bytearray.toInt", "bytearray.to_int_big_endian"),
    ("bytearray.toHex", "bytearray.to_hex"),
    ("bytearray.concat", "bytearray.concat"),
    ("bytearray.compare", "bytearray.compare"),
    ("bytearray.length", "bytearray.length"),
    ("bytearray.slice", "bytearray.slice"),
    ("bytearray.subarray", "bytearray.slice"),
    ("bytearray.take", "bytearray.take"),
    ("bytearray.drop", "bytearray.drop"),
    ("bytearray.push", "bytearray.push"),
    ("bytearray.at", "bytearray.at"),
    ("bytearray.isEmpty", "bytearray.is_empty"),
    ("bytearray.startsWith", "bytearray.starts_with"),
    ("bytearray.indexOf", "bytearray.index_of"),
    ("bytearray.reverse", "bytearray.reverse"),
    ("bytearray.alloc", "bytearray.from_int_big_endian"),
    ("bytearray.equals", "bytearray.compare"),
    ("bytearray.testBit", "bytearray.test_bit"),
    ("bytearray.foldl", "bytearray.foldl"),
    ("bytearray.foldr", "bytearray.foldr"),
];

const STRING_FUNCTIONS: &[Entry] = &[
    ("string.concat", "string.concat"),
    ("string.join", "string.join"),
    ("string.fromInt", "string.from_int"),
    ("string.fromBytes", "string.from_bytearray"),
    ("string.fromByteArray", "string.from_bytearray"),
    ("string.toBytes", "string.to_bytearray"),
    ("string.toByteArray", "string.to_bytearray"),
    ("string.toString", "string.from_int"),
    ("string.encode", "string.to_bytearray"),
    ("string.decode", "string.from_bytearray"),
    ("string.toHex", "string.to_hex"),
];

const INT_FUNCTIONS: &[Entry] = &[
    ("int.parse", "int.from_utf8"),
    ("int.parseInt", "int.from_utf8"),
    ("int.fromUtf8", "int.from_utf8"),
    ("int.fromBytes", "int.from_bytearray_big_endian"),
    ("int.compare", "int.compare"),
    ("parseInt", "int.from_utf8"),
    ("Number", "int.from_utf8"),
];

const MATH_FUNCTIONS: &[Entry] = &[
    ("math.abs", "math.abs"),
    ("math.max", "math.max"),
    ("math.min", "math.min"),
    ("math.pow", "math.pow"),
    ("math.pow2", "math.pow2"),
    ("math.sqrt", "math.sqrt"),
    ("math.log", "math.log"),
    ("math.log2", "math.log2"),
    ("math.clamp", "math.clamp"),
    ("math.gcd", "math.gcd"),
    ("math.isSqrt", "math.is_sqrt"),
    ("math.trunc", "math.abs"),
];

const RATIONAL_FUNCTIONS: &[Entry] = &[
    ("rational.new", "rational.new"),
    ("rational.fromInt", "rational.from_int"),
    ("rational.add", "rational.add"),
    ("rational.sub", "rational.sub"),
    ("rational.mul", "rational.mul"),
    ("rational.div", "rational.div"),
    ("rational.negate", "rational.negate"),
    ("rational.abs", "rational.abs"),
    ("rational.reciprocal", "rational.reciprocal"),
    ("rational.reduce", "rational.reduce"),
    ("rational.compare", "rational.compare"),
    ("rational.floor", "rational.floor"),
    ("rational.ceil", "rational.ceil"),
    ("rational.round", "rational.round"),
    ("rational.truncate", "rational.truncate"),
    ("rational.numerator", "rational.numerator"),
    ("rational.denominator", "rational.denominator"),
    ("rational.zero", "rational.zero"),
    ("rational.pow", "rational.pow"),
];

const CRYPTO_FUNCTIONS: &[Entry] = &[
    ("sha256", "crypto.sha2_256"),
    ("sha2_256", "crypto.sha2_256"),
    ("sha3_256", "crypto.sha3_256"),
    ("blake2b_224", "crypto.blake2b_224"),
    ("blake2b_256", "crypto.blake2b_256"),
    ("blake2b", "crypto.blake2b_256"),
    ("keccak256", "crypto.keccak_256"),
    ("keccak_256", "crypto.keccak_256"),
    ("verifySignature", "crypto.verify_ed25519_signature"),
    ("verifyEd25519Signature", "crypto.verify_ed25519_signature"),
    ("verifyEcdsaSignature", "crypto.verify_ecdsa_secp256k1_signature"),
    ("verifySchnorrSignature", "crypto.verify_schnorr_secp256k1_signature"),
    ("crypto.sha256", "crypto.sha2_256"),
    ("crypto.blake2b", "crypto.blake2b_256"),
    ("crypto.blake2b_224", "crypto.blake2b_224"),
    ("crypto.blake2b_256", "crypto.blake2b_256"),
    ("crypto.verify", "crypto.verify_ed25519_signature"),
];

const INTERVAL_FUNCTIONS: &[Entry] = &[
    ("interval.contains", "interval.contains"),
    ("interval.isEntirelyAfter", "interval.is_entirely_after"),
    ("interval.isEntirelyBefore", "interval.is_entirely_before"),
    ("interval.after", "interval.after"),
    ("interval.before", "interval.before"),
    ("interval.between", "interval.between"),
    ("interval.entirelyAfter", "interval.entirely_after"),
    ("interval.entirelyBefore", "interval.entirely_before"),
    ("interval.entirelyBetween", "interval.entirely_between"),
    ("interval.everything", "interval.everything"),
    ("interval.empty", "interval.empty"),
    ("interval.hull", "interval.hull"),
    ("interval.intersection", "interval.intersection"),
    ("interval.isEmpty", "interval.is_empty"),
    ("interval.max", "interval.max"),
    ("interval.min", "interval.min"),
];

const CBOR_FUNCTIONS: &[Entry] = &[
    ("JSON.stringify", "cbor.diagnostic"),
    ("cbor.diagnostic", "cbor.diagnostic"),
    ("cbor.serialise", "cbor.serialise"),
    ("cbor.serialize", "cbor.serialise"),
];

const BUILTIN_FUNCTIONS: &[Entry] = &[
    ("builtin.headList", "builtin.head_list"),
    ("builtin.tailList", "builtin.tail_list"),
    ("builtin.unConstrData", "builtin.un_constr_data"),
    ("builtin.unIData", "builtin.un_i_data"),
    ("builtin.unBData", "builtin.un_b_data"),
    ("builtin.unListData", "builtin.un_list_data"),
    ("builtin.unMapData", "builtin.un_map_data"),
    ("builtin.iData", "builtin.i_data"),
    ("builtin.bData", "builtin.b_data"),
    ("builtin.serialiseData", "builtin.serialise_data"),
    ("builtin.equalsData", "builtin.equals_data"),
    ("builtin.chooseData", "builtin.choose_data"),
    ("builtin.indexByteString", "builtin.index_bytearray"),
    ("builtin.lengthOfByteString", "builtin.length_of_bytearray"),
];

const LEDGER_FUNCTIONS: &[(&str, &str, &str)] = &[
    ("assets.lovelaceOf", "assets.lovelace_of", ASSETS),
    ("assets.quantityOf", "assets.quantity_of", ASSETS),
    ("assets.tokens", "assets.tokens", ASSETS),
    ("assets.policies", "assets.policies", ASSETS),
    ("assets.flatten", "assets.flatten", ASSETS),
    ("assets.merge", "assets.merge", ASSETS),
    ("assets.negate", "assets.negate", ASSETS),
    ("assets.fromLovelace", "assets.from_lovelace", ASSETS),
    ("assets.fromAsset", "assets.from_asset", ASSETS),
    ("assets.zero", "assets.zero", ASSETS),
    ("assets.isZero", "assets.is_zero", ASSETS),
    ("assets.withoutLovelace", "assets.without_lovelace", ASSETS),
    ("assets.add", "assets.add", ASSETS),
    ("assets.match", "assets.match", ASSETS),
    ("lovelaceOf", "assets.lovelace_of", ASSETS),
    ("quantityOf", "assets.quantity_of", ASSETS),
    ("transaction.findInput", "transaction.find_input", TRANSACTION),
    ("transaction.findDatum", "transaction.find_datum", TRANSACTION),
    ("transaction.findScriptOutputs", "transaction.find_script_outputs", TRANSACTION),
    ("transaction.placeholder", "transaction.placeholder", TRANSACTION),
    ("findInput", "transaction.find_input", TRANSACTION),
    ("findDatum", "transaction.find_datum", TRANSACTION),
    ("address.fromVerificationKey", "address.from_verification_key", ADDRESS),
    ("address.fromScript", "address.from_script", ADDRESS),
    ("address.withDelegationKey", "address.with_delegation_key", ADDRESS),
    ("address.withDelegationScript", "address.with_delegation_script", ADDRESS),
];

const PRELUDE_FUNCTIONS: &[Entry] = &[
    ("console.log", "trace"),
    ("console.error", "trace"),
    ("console.warn", "trace"),
    ("console.debug", "trace"),
    ("console.info", "trace"),
    ("identity", "identity"),
    ("always", "always"),
    ("flip", "flip"),
    ("not", "not"),
    ("Boolean", "identity"),
];

/// Method names resolved against any receiver, e.g. `xs.includes(x)`.
const METHODS: &[Entry] = &[
    ("includes", "list.includes"),
    ("map", "list.map"),
    ("filter", "list.filter"),
    ("flatMap", "list.flatMap"),
    ("some", "list.some"),
    ("every", "list.every"),
    ("find", "list.find"),
    ("findIndex", "list.findIndex"),
    ("indexOf", "list.indexOf"),
    ("concat", "list.concat"),
    ("reverse", "list.reverse"),
    ("slice", "list.slice"),
    ("at", "list.at"),
    ("push", "list.push"),
    ("unshift", "list.unshift"),
    ("forEach", "list.forEach"),
    ("flat", "list.flat"),
    ("sort", "list.sort"),
    ("startsWith", "bytearray.startsWith"),
    ("subarray", "bytearray.subarray"),
    ("toHex", "bytearray.toHex"),
    ("has", "dict.has"),
    ("get", "dict.get"),
    ("set", "dict.set"),
    ("delete", "dict.delete"),
    ("keys", "dict.keys"),
    ("values", "dict.values"),
    ("entries", "dict.entries"),
    ("toString", "string.toString"),
];

const TYPES: &[(&str, &str)] = &[
    ("OutputReference", TRANSACTION),
    ("Transaction", TRANSACTION),
    ("Input", TRANSACTION),
    ("Output", TRANSACTION),
    ("ValidityRange", TRANSACTION),
    ("ScriptPurpose", TRANSACTION),
    ("TransactionId", TRANSACTION),
    ("PolicyId", ASSETS),
    ("AssetName", ASSETS),
    ("Value", ASSETS),
    ("Lovelace", ASSETS),
    ("Credential", ADDRESS),
    ("Address", ADDRESS),
    ("PaymentCredential", ADDRESS),
    ("StakeCredential", ADDRESS),
    ("Script", ADDRESS),
    ("VerificationKeyHash", CRYPTO),
    ("VerificationKey", CRYPTO),
    ("ScriptHash", CRYPTO),
    ("Signature", CRYPTO),
    ("Hash", CRYPTO),
    ("Blake2b_224", CRYPTO),
    ("Blake2b_256", CRYPTO),
    ("Certificate", CERTIFICATE),
    ("Interval", INTERVAL),
    ("IntervalBound", INTERVAL),
    ("Rational", RATIONAL),
    ("Dict", DICT),
];

/// Namespace spellings folded onto a canonical prefix by the two-level lookup.
///
/// Only namespaces belong here: a value receiver such as `xs.includes(y)` is
/// resolved through the method table so the receiver becomes the first argument.
const RECEIVER_PREFIXES: &[(&str, &str)] = &[
    ("Array", "list"),
    ("List", "list"),
    ("list", "list"),
    ("String", "string"),
    ("string", "string"),
    ("Math", "math"),
    ("math", "math"),
    ("Buffer", "bytearray"),
    ("ByteArray", "bytearray"),
    ("bytearray", "bytearray"),
    ("console", "console"),
    ("Map", "dict"),
    ("dict", "dict"),
    ("Dict", "dict"),
    ("Option", "option"),
    ("option", "option"),
];

fn register(
    table: &mut HashMap<&'static str, BuiltinMapping>,
    group: Option<&'static str>,
    entries: &[Entry],
) {
    for &(source, target) in entries {
        table.insert(
            source,
            BuiltinMapping {
                target,
                import_group: group,
                kind: MappingKind::Function,
            },
        );
    }
}

static TABLE: Lazy<HashMap<&'static str, BuiltinMapping>> = Lazy::new(|| {
    let mut table = HashMap::new();
    register(&mut table, Some(LIST), LIST_FUNCTIONS);
    register(&mut table, Some(DICT), DICT_FUNCTIONS);
    register(&mut table, Some(PAIRS), PAIRS_FUNCTIONS);
    register(&mut table, Some(OPTION), OPTION_FUNCTIONS);
    register(&mut table, Some(BYTES), BYTEARRAY_FUNCTIONS);
    register(&mut table, Some(STRING), STRING_FUNCTIONS);
    register(&mut table, Some(INT), INT_FUNCTIONS);
    register(&mut table, Some(MATH), MATH_FUNCTIONS);
    register(&mut table, Some(RATIONAL), RATIONAL_FUNCTIONS);
    register(&mut table, Some(CRYPTO), CRYPTO_FUNCTIONS);
    register(&mut table, Some(INTERVAL), INTERVAL_FUNCTIONS);
    register(&mut table, Some(CBOR), CBOR_FUNCTIONS);
    register(&mut table, Some(BUILTIN), BUILTIN_FUNCTIONS);
    register(&mut table, None, PRELUDE_FUNCTIONS);

    for &(source, target, group) in LEDGER_FUNCTIONS {
        table.insert(
            source,
            BuiltinMapping {
                target,
                import_group: Some(group),
                kind: MappingKind::Function,
            },
        );
    }
    for &(name, group) in TYPES {
        table.insert(
            name,
            BuiltinMapping {
                target: name,
                import_group: Some(group),
                kind: MappingKind::Type,
            },
        );
    }
    table
});

static METHOD_TABLE: Lazy<HashMap<&'static str, BuiltinMapping>> = Lazy::new(|| {
    METHODS
        .iter()
        .filter_map(|&(member, key)| {
            let mapping = TABLE.get(key)?;
            Some((
                member,
                BuiltinMapping {
                    kind: MappingKind::Method,
                    ..*mapping
                },
            ))
        })
        .collect()
});

/// Registry handle for one compilation.
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    used: BTreeMap<&'static str, BTreeSet<&'static str>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the static table.
    pub fn len(&self) -> usize {
        TABLE.len()
    }

    pub fn is_empty(&self) -> bool {
        TABLE.is_empty()
    }

    /// Resolve a source name, first literally, then through its receiver prefix.
    pub fn get(&self, name: &str) -> Option<&'static BuiltinMapping> {
        if let Some(mapping) = TABLE.get(name) {
            return Some(mapping);
        }
        let (receiver, member) = name.rsplit_once('.')?;
        let prefix = RECEIVER_PREFIXES
            .iter()
            .find(|(spelling, _)| *spelling == receiver)
            .map(|(_, prefix)| *prefix)?;
        TABLE.get(format!("{}.{}", prefix, member).as_str())
    }

    /// Resolve a method called on an arbitrary receiver.
    pub fn method(&self, member: &str) -> Option<&'static BuiltinMapping> {
        METHOD_TABLE.get(member)
    }

    /// Whether `name` is a ledger/library type the table knows how to import.
    pub fn is_type(&self, name: &str) -> bool {
        matches!(TABLE.get(name), Some(m) if m.kind == MappingKind::Type)
    }

    /// Record that `name` was emitted. Returns false when it is not a builtin.
    pub fn mark_used(&mut self, name: &str) -> bool {
        match self.get(name).or_else(|| self.method(name)) {
            Some(mapping) => {
                self.mark_mapping(mapping);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_mapping(&mut self, mapping: &'static BuiltinMapping) {
        if let Some(group) = mapping.import_group {
            self.used.entry(group).or_default().insert(mapping.target);
        }
    }

    pub fn used_import_groups(&self) -> Vec<&'static str> {
        self.used.keys().copied().collect()
    }

    /// Type names used from `group`, for `use group.{A, B}` imports.
    pub fn used_types_in(&self, group: &str) -> Vec<&'static str> {
        self.used
            .get(group)
            .map(|names| {
                names
                    .iter()
                    .copied()
                    .filter(|name| name.chars().next().is_some_and(char::is_uppercase))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }
}
