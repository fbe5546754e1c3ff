//! Bengali to Latin lookup tables used by the plate normalizer.
//!
//! Region and class tables are sorted by key length (longest first) once, on
//! first use, so compound names win over their own prefixes.

use once_cell::sync::Lazy;

/// Bengali digit to ASCII digit.
pub const DIGITS: [(char, char); 10] = [
    ('০', '0'),
    ('১', '1'),
    ('২', '2'),
    ('৩', '3'),
    ('৪', '4'),
    ('৫', '5'),
    ('৬', '6'),
    ('৭', '7'),
    ('৮', '8'),
    ('৯', '9'),
];

/// Administrative regions, including the "metro" compounds and a clipped
/// metro spelling OCR tends to produce.
const REGION_ENTRIES: &[(&str, &str)] = &[
    ("ঢাকা মেট্রো", "DHAKA METRO"),
    ("ঢাকা মেট্র", "DHAKA METRO"),
    ("ঢাকা", "DHAKA"),
    ("চট্টগ্রাম মেট্রো", "CHATTOGRAM METRO"),
    ("চট্ট মেট্রো", "CHATTOGRAM METRO"),
    ("চট্টগ্রাম", "CHATTOGRAM"),
    ("রাজশাহী মেট্রো", "RAJSHAHI METRO"),
    ("রাজশাহী", "RAJSHAHI"),
    ("খুলনা মেট্রো", "KHULNA METRO"),
    ("খুলনা", "KHULNA"),
    ("সিলেট মেট্রো", "SYLHET METRO"),
    ("সিলেট", "SYLHET"),
    ("রংপুর মেট্রো", "RANGPUR METRO"),
    ("রংপুর", "RANGPUR"),
    ("বরিশাল মেট্রো", "BARISHAL METRO"),
    ("বরিশাল", "BARISHAL"),
    ("ময়মনসিংহ মেট্রো", "MYMENSINGH METRO"),
    ("ময়মনসিংহ", "MYMENSINGH"),
    ("গাজীপুর মেট্রো", "GAZIPUR METRO"),
    ("গাজীপুর", "GAZIPUR"),
    ("নারায়ণগঞ্জ মেট্রো", "NARAYANGANJ METRO"),
    ("নারায়ণগঞ্জ", "NARAYANGANJ"),
    ("কুমিল্লা", "CUMILLA"),
    ("নোয়াখালী", "NOAKHALI"),
    ("ফেনী", "FENI"),
    ("ব্রাহ্মণবাড়িয়া", "BRAHMANBARIA"),
    ("চাঁদপুর", "CHANDPUR"),
    ("লক্ষ্মীপুর", "LAKSHMIPUR"),
    ("কক্সবাজার", "COX BAZAR"),
    ("বান্দরবান", "BANDARBAN"),
    ("রাঙ্গামাটি", "RANGAMATI"),
    ("খাগড়াছড়ি", "KHAGRACHHARI"),
    ("পাবনা", "PABNA"),
    ("বগুড়া", "BOGURA"),
    ("নাটোর", "NATORE"),
    ("নওগাঁ", "NAOGAON"),
    ("চাঁপাইনবাবগঞ্জ", "CHAPAINAWABGANJ"),
    ("জয়পুরহাট", "JOYPURHAT"),
    ("যশোর", "JESSORE"),
    ("সাতক্ষীরা", "SATKHIRA"),
    ("ঝিনাইদহ", "JHENAIDAH"),
    ("নড়াইল", "NARAIL"),
    ("মাগুরা", "MAGURA"),
    ("কুষ্টিয়া", "KUSHTIA"),
    ("মেহেরপুর", "MEHERPUR"),
    ("চুয়াডাঙ্গা", "CHUADANGA"),
    ("হবিগঞ্জ", "HABIGANJ"),
    ("মৌলভীবাজার", "MOULVIBAZAR"),
    ("সুনামগঞ্জ", "SUNAMGANJ"),
    ("দিনাজপুর", "DINAJPUR"),
    ("ঠাকুরগাঁও", "THAKURGAON"),
    ("পঞ্চগড়", "PANCHAGARH"),
    ("নীলফামারী", "NILPHAMARI"),
    ("লালমনিরহাট", "LALMONIRHAT"),
    ("কুড়িগ্রাম", "KURIGRAM"),
    ("গাইবান্ধা", "GAIBANDHA"),
    ("পটুয়াখালী", "PATUAKHALI"),
    ("বরগুনা", "BARGUNA"),
    ("পিরোজপুর", "PIROJPUR"),
    ("ভোলা", "BHOLA"),
    ("ঝালকাঠি", "JHALOKATHI"),
    ("জামালপুর", "JAMALPUR"),
    ("শেরপুর", "SHERPUR"),
    ("নেত্রকোনা", "NETROKONA"),
    ("টাঙ্গাইল", "TANGAIL"),
    ("কিশোরগঞ্জ", "KISHOREGANJ"),
    ("মানিকগঞ্জ", "MANIKGANJ"),
    ("মুন্সিগঞ্জ", "MUNSHIGANJ"),
    ("নরসিংদী", "NARSINGDI"),
    ("গোপালগঞ্জ", "GOPALGANJ"),
    ("মাদারীপুর", "MADARIPUR"),
    ("শরীয়তপুর", "SHARIATPUR"),
    ("ফরিদপুর", "FARIDPUR"),
    ("রাজবাড়ী", "RAJBARI"),
    ("সিরাজগঞ্জ", "SIRAJGANJ"),
];

/// Vehicle class letters plus the ligatures seen on plates.
const CLASS_ENTRIES: &[(&str, &str)] = &[
    ("ক", "KA"), ("খ", "KHA"), ("গ", "GA"), ("ঘ", "GHA"),
    ("ঙ", "UMA"), ("চ", "CHA"), ("ছ", "CHHA"), ("জ", "JA"),
    ("ঝ", "JHA"), ("ঞ", "NYA"), ("ট", "TA"), ("ঠ", "THA"),
    ("ড", "DA"), ("ঢ", "DHA"), ("ণ", "NA"), ("ত", "TA"),
    ("থ", "THA"), ("দ", "DA"), ("ধ", "DHA"), ("ন", "NA"),
    ("প", "PA"), ("ফ", "PHA"), ("ব", "BA"), ("ভ", "BHA"),
    ("ম", "MA"), ("য", "YA"), ("র", "RA"), ("ল", "LA"),
    ("শ", "SHA"), ("ষ", "SHA"), ("স", "SA"), ("হ", "HA"),
    ("ড়", "RA"), ("ঢ়", "RHA"), ("য়", "YA"), ("ৎ", "T"),
    ("ং", "NG"), ("ঃ", "H"), ("ঁ", "N"), ("থক", "THAKA"),
    ("থখ", "THAKHA"), ("থগ", "THAGA"),
];

pub static REGIONS: Lazy<LookupTable> = Lazy::new(|| LookupTable::longest_first(REGION_ENTRIES));

pub static CLASSES: Lazy<LookupTable> = Lazy::new(|| LookupTable::longest_first(CLASS_ENTRIES));

/// Immutable key/value table, scanned in longest-key-first order.
#[derive(Debug)]
pub struct LookupTable {
    entries: Vec<(&'static str, &'static str)>,
}

impl LookupTable {
    /// Build a table sorted by key length, descending. Keys of equal length
    /// keep their declaration order.
    pub fn longest_first(entries: &[(&'static str, &'static str)]) -> Self {
        let mut entries = entries.to_vec();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        Self { entries }
    }

    pub fn entries(&self) -> &[(&'static str, &'static str)] {
        &self.entries
    }

    /// Replace the first occurrence of the first (longest) key present in
    /// `text`, then stop. Returns `None` when no key occurs.
    pub fn replace_first(&self, text: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(key, _)| text.contains(key))
            .map(|(key, value)| text.replacen(key, value, 1))
    }

    /// Replace every occurrence of every key, longest keys first.
    pub fn replace_all(&self, text: &str) -> String {
        self.entries
            .iter()
            .fold(text.to_string(), |acc, (key, value)| {
                if acc.contains(key) {
                    acc.replace(key, value)
                } else {
                    acc
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_sorted_longest_first() {
        for table in [&*REGIONS, &*CLASSES] {
            let lengths: Vec<usize> = table.entries().iter().map(|(k, _)| k.chars().count()).collect();
            assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn metro_compound_beats_its_prefix() {
        let out = REGIONS.replace_first("ঢাকা মেট্রো গ").unwrap();
        assert_eq!(out, "DHAKA METRO গ");
    }

    #[test]
    fn region_replaced_at_most_once() {
        // the longest key present wins and nothing else is touched
        let out = REGIONS.replace_first("ঢাকা ঢাকা খুলনা").unwrap();
        assert_eq!(out, "ঢাকা ঢাকা KHULNA");

        let out = REGIONS.replace_first("ঢাকা ঢাকা").unwrap();
        assert_eq!(out, "DHAKA ঢাকা");
    }

    #[test]
    fn class_letters_replaced_everywhere() {
        assert_eq!(CLASSES.replace_all("গ গ"), "GA GA");
        // ligature wins over its first letter
        assert_eq!(CLASSES.replace_all("থগ"), "THAGA");
    }

    #[test]
    fn no_match_is_none() {
        assert!(REGIONS.replace_first("DHAKA METRO").is_none());
        assert_eq!(CLASSES.replace_all("ABC 12"), "ABC 12");
    }
}
