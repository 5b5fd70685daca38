//! Urban LGA classification
//!
//! Closed set of major urban Local Government Areas used by the Economic
//! Igniter: a fuel-price shock is modeled as combustible only where dense
//! urban populations depend on transported goods and generator fuel.

/// Major urban LGAs across Nigeria's large metros. Matching is
/// case-insensitive on the LGA name alone.
const URBAN_LGAS: &[&str] = &[
    // Lagos metro
    "ikeja",
    "eti-osa",
    "lagos island",
    "lagos mainland",
    "surulere",
    "alimosho",
    "agege",
    "apapa",
    "oshodi-isolo",
    "mushin",
    "shomolu",
    "kosofe",
    "ikorodu",
    "ajeromi-ifelodun",
    "amuwo-odofin",
    "ojo",
    // Abuja (FCT)
    "abuja municipal",
    "bwari",
    // Kano metro
    "kano municipal",
    "fagge",
    "dala",
    "gwale",
    "tarauni",
    "nassarawa",
    "ungogo",
    "kumbotso",
    // Rivers
    "port harcourt",
    "obio-akpor",
    // Oyo
    "ibadan north",
    "ibadan north-east",
    "ibadan north-west",
    "ibadan south-east",
    "ibadan south-west",
    // Kaduna
    "kaduna north",
    "kaduna south",
    "zaria",
    "chikun",
    "igabi",
    // Enugu
    "enugu east",
    "enugu north",
    "enugu south",
    // Anambra
    "onitsha north",
    "onitsha south",
    "awka south",
    "nnewi north",
    // Edo
    "oredo",
    "egor",
    "ikpoba-okha",
    // Borno
    "maiduguri",
    "jere",
    // Plateau
    "jos north",
    "jos south",
    // Abia
    "aba north",
    "aba south",
    "umuahia north",
    // Delta
    "warri south",
    "uvwie",
    // Akwa Ibom
    "uyo",
    // Cross River
    "calabar municipal",
    "calabar south",
    // Sokoto
    "sokoto north",
    "sokoto south",
    // Katsina
    "katsina",
    // Bauchi
    "bauchi",
    // Benue
    "makurdi",
    // Kwara
    "ilorin west",
    "ilorin east",
];

/// Whether the given LGA belongs to the urban set.
pub fn is_urban_lga(lga: &str) -> bool {
    let needle = lga.trim().to_lowercase();
    URBAN_LGAS.contains(&needle.as_str())
}
