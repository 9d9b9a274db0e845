//! Random helpers: `alfred.random.Random<Category>…`, optionally with
//! parenthesised integer arguments (`RandomIntBetween(1,100)`).
//!
//! The method name is checked against the allow-list at load time; the
//! first letter is upper-cased so `randomInt` and `RandomInt` are the same
//! generator.

use fake::Fake;
use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

use super::Helper;
use crate::{Error, Result};

static ARGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("args regex"));

const METHOD_NAMES_ALLOWED: &[&str] = &[
    "RandomGuid",
    "RandomUUID",
    "RandomAlphanumeric",
    "RandomBoolean",
    "RandomInt",
    "RandomIntBetween",
    "RandomSafeColorName",
    "RandomSafeColorHex",
    "RandomAbbreviation",
    "RandomIP",
    "RandomIpv6",
    "RandomMACAddress",
    "RandomPassword",
    "RandomLocale",
    "RandomUserAgent",
    "RandomProtocol",
    "RandomSemver",
    "RandomPersonFirstName",
    "RandomPersonLastName",
    "RandomPersonFullName",
    "RandomPersonNameSuffix",
    "RandomJobArea",
    "RandomJobDescriptor",
    "RandomJobTitle",
    "RandomJobType",
    "RandomPhoneNumber",
    "RandomPhoneNumberExt",
    "RandomAddressCity",
    "RandomAddresStreetName",
    "RandomAddressStreetAddress",
    "RandomAddressCountry",
    "RandomCountryCode",
    "RandomAddressLatitude",
    "RandomAddressLongitude",
    "RandomBankAccount",
    "RandomBankAccountName",
    "RandomCreditCardMask",
    "RandomBankAccountBic",
    "RandomBankAccountIban",
    "RandomTransactionType",
    "RandomCurrencyCode",
    "RandomCurrencyName",
    "RandomCurrencySymbol",
    "RandomCompanyName",
    "RandomCompanySuffix",
    "RandomBs",
    "RandomBsAdjective",
    "RandomBsBuzzWord",
    "RandomBsNoun",
    "RandomCatchPhrase",
    "RandomCatchPhraseAdjective",
    "RandomCatchPhraseDescriptor",
    "RandomCatchPhraseNoun",
    "RandomDatabaseColumn",
    "RandomDatabaseType",
    "RandomDatabaseCollation",
    "RandomDatabaseEngine",
    "RandomDateFuture",
    "RandomDatePast",
    "RandomDateRecent",
    "RandomWeekday",
    "RandomMonth",
    "RandomDomainName",
    "RandomDomainSuffix",
    "RandomDomainWord",
    "RandomEmail",
    "RandomExampleEmail",
    "RandomUsername",
    "RandomUrl",
    "RandomFileName",
    "RandomFileType",
    "RandomFileExtension",
    "RandomCommonFileName",
    "RandomCommonFileType",
    "RandomCommonFileExtension",
    "RandomFilePath",
    "RandomDirectoryPath",
    "RandomMimeType",
    "RandomPrice",
    "RandomProduct",
    "RandomProductAdjective",
    "RandomProductMaterial",
    "RandomProductName",
    "RandomNoun",
    "RandomVerb",
    "RandomAdjective",
    "RandomWord",
    "RandomWords",
    "RandomPhrase",
    "RandomLoremWord",
    "RandomLoremWords",
    "RandomLoremSentence",
    "RandomLoremSentences",
    "RandomLoremParagraph",
    "RandomLoremParagraphs",
    "RandomLoremText",
    "RandomLoremSlug",
    "RandomLoremLines",
];

pub(crate) fn sanitize_random_helper(mut helper: Helper) -> Result<Helper> {
    let raw = helper.target.clone();
    let method_end = raw.find('(').unwrap_or(raw.len());

    let mut method = raw[..method_end].trim().to_string();
    if !method.is_empty() {
        let mut chars = method.chars();
        let first = chars.next().expect("non-empty method name");
        method = first.to_uppercase().collect::<String>() + chars.as_str();
    }
    check_method_name(&method)?;

    if let Some(caps) = ARGS_RE.captures(&raw) {
        let inner = caps[1].trim().to_string();
        if !inner.is_empty() {
            for (index, arg) in inner.split(',').enumerate() {
                let value: i64 = arg.trim().parse().map_err(|_| {
                    Error::invalid_helper_syntax(format!(
                        "random argument '{}' of '{raw}' is not an integer",
                        arg.trim()
                    ))
                })?;
                helper.add_private_param(format!("param-{index}"), value.to_string());
            }
        }
    }

    helper.target = method;
    Ok(helper)
}

pub fn check_method_name(method: &str) -> Result<()> {
    if METHOD_NAMES_ALLOWED.contains(&method) {
        return Ok(());
    }
    Err(Error::UnknownRandomMethod {
        name: method.to_string(),
    })
}

/// Integer arguments parsed at sanitise time, in declaration order.
pub fn helper_params(helper: &Helper) -> Vec<i64> {
    let mut params = Vec::new();
    let mut index = 0;
    loop {
        let raw = helper.private_param(&format!("param-{index}"));
        if raw.is_empty() {
            return params;
        }
        match raw.parse() {
            Ok(value) => params.push(value),
            Err(_) => return params,
        }
        index += 1;
    }
}

fn pick(items: &[&str]) -> String {
    items[rand::rng().random_range(0..items.len())].to_string()
}

fn alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| char::from(b'0' + rng.random_range(0..10u8))).collect()
}

/// Invoke the named generator. The method name passed sanitisation, so an
/// unknown name can only mean allow-list drift and yields an empty value.
pub fn random_value(method: &str, params: &[i64]) -> String {
    use fake::faker::address::en as address;
    use fake::faker::company::en as company;
    use fake::faker::currency::en as currency;
    use fake::faker::filesystem::en as filesystem;
    use fake::faker::finance::en as finance;
    use fake::faker::internet::en as internet;
    use fake::faker::job::en as job;
    use fake::faker::lorem::en as lorem;
    use fake::faker::name::en as name;
    use fake::faker::phone_number::en as phone;

    let mut rng = rand::rng();

    match method {
        "RandomGuid" | "RandomUUID" => uuid::Uuid::new_v4().to_string(),
        "RandomAlphanumeric" => {
            let len = params.first().copied().unwrap_or(10).clamp(1, 4096) as usize;
            alphanumeric(len)
        }
        "RandomBoolean" => rng.random_bool(0.5).to_string(),
        "RandomInt" => rng.random_range(0..1000).to_string(),
        "RandomIntBetween" => {
            let min = params.first().copied().unwrap_or(0);
            let max = params.get(1).copied().unwrap_or(min + 100);
            if max <= min {
                min.to_string()
            } else {
                rng.random_range(min..max).to_string()
            }
        }
        "RandomSafeColorName" => pick(&[
            "black", "maroon", "green", "olive", "navy", "purple", "teal", "gray", "silver",
            "red", "lime", "yellow", "blue", "fuchsia", "aqua", "white",
        ]),
        "RandomSafeColorHex" => format!("#{:06x}", rng.random_range(0..0x100_0000)),
        "RandomAbbreviation" => pick(&[
            "TCP", "HTTP", "SDD", "RAM", "GB", "CSS", "SSL", "AGP", "SQL", "FTP", "PCI", "AI",
            "ADP", "RSS", "XML", "EXE", "COM", "HDD", "THX", "SMTP", "SMS", "USB", "PNG", "JSON",
        ]),
        "RandomIP" => internet::IPv4().fake(),
        "RandomIpv6" => internet::IPv6().fake(),
        "RandomMACAddress" => internet::MACAddress().fake(),
        "RandomPassword" => internet::Password(8..16).fake(),
        "RandomLocale" => pick(&[
            "af", "az", "cz", "de", "en", "es", "fr", "it", "ja", "nl", "pl", "pt-BR", "ru",
            "tr", "zh-CN",
        ]),
        "RandomUserAgent" => internet::UserAgent().fake(),
        "RandomProtocol" => pick(&["http", "https"]),
        "RandomSemver" => filesystem::Semver().fake(),
        "RandomPersonFirstName" => name::FirstName().fake(),
        "RandomPersonLastName" => name::LastName().fake(),
        "RandomPersonFullName" => name::Name().fake(),
        "RandomPersonNameSuffix" => name::Suffix().fake(),
        "RandomJobArea" => job::Field().fake(),
        "RandomJobDescriptor" => job::Seniority().fake(),
        "RandomJobTitle" => job::Title().fake(),
        "RandomJobType" => job::Position().fake(),
        "RandomPhoneNumber" => phone::PhoneNumber().fake(),
        "RandomPhoneNumberExt" => phone::CellNumber().fake(),
        "RandomAddressCity" => address::CityName().fake(),
        "RandomAddresStreetName" => address::StreetName().fake(),
        "RandomAddressStreetAddress" => format!(
            "{} {}",
            address::BuildingNumber().fake::<String>(),
            address::StreetName().fake::<String>()
        ),
        "RandomAddressCountry" => address::CountryName().fake(),
        "RandomCountryCode" => address::CountryCode().fake(),
        "RandomAddressLatitude" => format!("{:.6}", address::Latitude().fake::<f64>()),
        "RandomAddressLongitude" => format!("{:.6}", address::Longitude().fake::<f64>()),
        "RandomBankAccount" => digits(8),
        "RandomBankAccountName" => pick(&[
            "Checking", "Savings", "Money Market", "Investment", "Home Loan", "Credit Card",
            "Auto Loan", "Personal Loan",
        ]),
        "RandomCreditCardMask" => digits(4),
        "RandomBankAccountBic" => finance::Bic().fake(),
        "RandomBankAccountIban" => format!("DE{}{}", digits(2), digits(18)),
        "RandomTransactionType" => pick(&["deposit", "withdrawal", "payment", "invoice"]),
        "RandomCurrencyCode" => currency::CurrencyCode().fake(),
        "RandomCurrencyName" => currency::CurrencyName().fake(),
        "RandomCurrencySymbol" => currency::CurrencySymbol().fake(),
        "RandomCompanyName" => company::CompanyName().fake(),
        "RandomCompanySuffix" => company::CompanySuffix().fake(),
        "RandomBs" => company::Bs().fake(),
        "RandomBsAdjective" | "RandomCatchPhraseAdjective" => company::BsAdj().fake(),
        "RandomBsBuzzWord" | "RandomCatchPhraseDescriptor" => company::Buzzword().fake(),
        "RandomBsNoun" | "RandomCatchPhraseNoun" => company::BsNoun().fake(),
        "RandomCatchPhrase" => format!(
            "{} {} {}",
            company::Buzzword().fake::<String>(),
            company::BsAdj().fake::<String>(),
            company::BsNoun().fake::<String>()
        ),
        "RandomDatabaseColumn" => pick(&[
            "id", "title", "name", "email", "phone", "token", "group", "category", "password",
            "comment", "avatar", "status", "createdAt", "updatedAt",
        ]),
        "RandomDatabaseType" => pick(&[
            "int", "varchar", "text", "date", "datetime", "tinyint", "smallint", "bigint",
            "timestamp", "boolean", "enum", "blob", "binary",
        ]),
        "RandomDatabaseCollation" => pick(&[
            "utf8_unicode_ci", "utf8_general_ci", "utf8_bin", "ascii_bin", "ascii_general_ci",
            "cp1250_bin", "cp1250_general_ci",
        ]),
        "RandomDatabaseEngine" => {
            pick(&["InnoDB", "MyISAM", "MEMORY", "CSV", "BLACKHOLE", "ARCHIVE"])
        }
        "RandomDateFuture" => {
            (chrono::Utc::now() + chrono::Duration::seconds(rng.random_range(3600..31_536_000)))
                .to_rfc3339()
        }
        "RandomDatePast" => {
            (chrono::Utc::now() - chrono::Duration::seconds(rng.random_range(3600..31_536_000)))
                .to_rfc3339()
        }
        "RandomDateRecent" => {
            (chrono::Utc::now() - chrono::Duration::seconds(rng.random_range(60..86_400)))
                .to_rfc3339()
        }
        "RandomWeekday" => pick(&[
            "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
        ]),
        "RandomMonth" => pick(&[
            "January", "February", "March", "April", "May", "June", "July", "August",
            "September", "October", "November", "December",
        ]),
        "RandomDomainName" => format!(
            "{}.{}",
            lorem::Word().fake::<String>().to_lowercase(),
            internet::DomainSuffix().fake::<String>()
        ),
        "RandomDomainSuffix" => internet::DomainSuffix().fake(),
        "RandomDomainWord" => lorem::Word().fake::<String>().to_lowercase(),
        "RandomEmail" => internet::SafeEmail().fake(),
        "RandomExampleEmail" => {
            format!("{}@example.com", internet::Username().fake::<String>())
        }
        "RandomUsername" => internet::Username().fake(),
        "RandomUrl" => format!(
            "https://{}.{}",
            lorem::Word().fake::<String>().to_lowercase(),
            internet::DomainSuffix().fake::<String>()
        ),
        "RandomFileName" => filesystem::FileName().fake(),
        "RandomFileType" | "RandomCommonFileType" => {
            pick(&["video", "audio", "image", "text", "application"])
        }
        "RandomFileExtension" => filesystem::FileExtension().fake(),
        "RandomCommonFileName" => format!(
            "{}.{}",
            lorem::Word().fake::<String>().to_lowercase(),
            pick(&["pdf", "mp3", "wav", "png", "jpeg", "mpeg"])
        ),
        "RandomCommonFileExtension" => pick(&["pdf", "mp3", "wav", "png", "jpeg", "mpeg"]),
        "RandomFilePath" => filesystem::FilePath().fake(),
        "RandomDirectoryPath" => filesystem::DirPath().fake(),
        "RandomMimeType" => filesystem::MimeType().fake(),
        "RandomPrice" => format!("{:.2}", rng.random_range(0.0..1000.0_f64)),
        "RandomProduct" => pick(&[
            "Chair", "Car", "Computer", "Keyboard", "Mouse", "Bike", "Ball", "Gloves", "Pants",
            "Shirt", "Table", "Shoes", "Hat", "Towels", "Soap", "Tuna", "Chicken", "Fish",
            "Cheese", "Bacon", "Pizza", "Salad", "Sausages", "Chips",
        ]),
        "RandomProductAdjective" => pick(&[
            "Small", "Ergonomic", "Rustic", "Intelligent", "Gorgeous", "Incredible",
            "Fantastic", "Practical", "Sleek", "Awesome", "Generic", "Handcrafted", "Handmade",
            "Licensed", "Refined", "Unbranded", "Tasty",
        ]),
        "RandomProductMaterial" => pick(&[
            "Steel", "Wooden", "Concrete", "Plastic", "Cotton", "Granite", "Rubber", "Metal",
            "Soft", "Fresh", "Frozen",
        ]),
        "RandomProductName" => format!(
            "{} {} {}",
            random_value("RandomProductAdjective", &[]),
            random_value("RandomProductMaterial", &[]),
            random_value("RandomProduct", &[])
        ),
        "RandomNoun" => pick(&[
            "driver", "protocol", "bandwidth", "panel", "microchip", "program", "port", "card",
            "array", "interface", "system", "sensor", "firewall", "hard drive", "pixel",
            "alarm", "feed", "monitor", "application", "transmitter", "bus", "circuit",
            "capacitor", "matrix",
        ]),
        "RandomVerb" => pick(&[
            "back up", "bypass", "hack", "override", "compress", "copy", "navigate", "index",
            "connect", "generate", "quantify", "calculate", "synthesize", "input", "transmit",
            "program", "reboot", "parse",
        ]),
        "RandomAdjective" => pick(&[
            "auxiliary", "primary", "back-end", "digital", "open-source", "virtual",
            "cross-platform", "redundant", "online", "haptic", "multi-byte", "bluetooth",
            "wireless", "1080p", "neural", "optical", "solid state", "mobile",
        ]),
        "RandomWord" | "RandomLoremWord" => lorem::Word().fake(),
        "RandomWords" | "RandomLoremWords" => {
            lorem::Words(3..6).fake::<Vec<String>>().join(" ")
        }
        "RandomPhrase" | "RandomLoremSentence" => lorem::Sentence(4..12).fake(),
        "RandomLoremSentences" => lorem::Sentences(2..5).fake::<Vec<String>>().join(" "),
        "RandomLoremParagraph" | "RandomLoremText" => lorem::Paragraph(3..7).fake(),
        "RandomLoremParagraphs" => {
            lorem::Paragraphs(2..4).fake::<Vec<String>>().join("\n")
        }
        "RandomLoremSlug" => lorem::Words(3..4)
            .fake::<Vec<String>>()
            .join("-")
            .to_lowercase(),
        "RandomLoremLines" => lorem::Sentences(1..4).fake::<Vec<String>>().join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::build_helpers;

    #[test]
    fn sanitize_capitalizes_and_checks_the_method_name() {
        let helpers = build_helpers(b"{{ alfred.random.randomInt }}").unwrap();
        assert_eq!(helpers[0].target, "RandomInt");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = build_helpers(b"{{ alfred.random.RandomNope }}").unwrap_err();
        assert!(matches!(err, Error::UnknownRandomMethod { .. }));
    }

    #[test]
    fn integer_arguments_land_in_private_params() {
        let helpers =
            build_helpers(b"{{ alfred.random.RandomIntBetween(1,100) @name:'n' }}").unwrap();
        let h = &helpers[0];
        assert_eq!(h.private_param("param-0"), "1");
        assert_eq!(h.private_param("param-1"), "100");
        assert_eq!(helper_params(h), vec![1, 100]);
    }

    #[test]
    fn non_integer_arguments_are_rejected() {
        assert!(build_helpers(b"{{ alfred.random.RandomIntBetween(1,many) }}").is_err());
    }

    #[test]
    fn int_between_is_half_open() {
        for _ in 0..200 {
            let value: i64 = random_value("RandomIntBetween", &[1, 100]).parse().unwrap();
            assert!((1..100).contains(&value));
        }
    }

    #[test]
    fn every_allowed_method_produces_a_value() {
        for method in METHOD_NAMES_ALLOWED {
            let value = random_value(method, &[1, 10]);
            assert!(!value.is_empty(), "{method} produced an empty value");
        }
    }

    #[test]
    fn uuid_methods_produce_parsable_uuids() {
        let value = random_value("RandomUUID", &[]);
        assert!(uuid::Uuid::parse_str(&value).is_ok());
    }
}
