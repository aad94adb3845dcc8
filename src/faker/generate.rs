//! Value producers backing each generator kind.

use fake::faker::address::en::{BuildingNumber, CityName, StateAbbr, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const LOWER_ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DIGITS: &[u8] = b"0123456789";

/// Length of the random prefix mixed into generated emails
const EMAIL_TOKEN_LEN: usize = 5;

fn sample_chars(charset: &[u8], length: usize) -> String {
    (0..length)
        .map(|_| charset[rand::random_range(0..charset.len())] as char)
        .collect()
}

pub(super) fn random_string(length: usize) -> String {
    sample_chars(ALPHANUMERIC, length)
}

pub(super) fn first_name() -> String {
    FirstName().fake()
}

pub(super) fn last_name() -> String {
    LastName().fake()
}

pub(super) fn full_name() -> String {
    Name().fake()
}

pub(super) fn phone() -> String {
    PhoneNumber().fake()
}

/// Safe email with a random prefix on the local part, to make collisions
/// between rows unlikely. Not a uniqueness guarantee.
pub(super) fn email() -> String {
    let email: String = SafeEmail().fake();
    format!("{}{}", sample_chars(LOWER_ALPHANUMERIC, EMAIL_TOKEN_LEN), email)
}

pub(super) fn company() -> String {
    CompanyName().fake()
}

pub(super) fn street_address() -> String {
    let number: String = BuildingNumber().fake();
    let street: String = StreetName().fake();
    format!("{} {}", number, street)
}

pub(super) fn address() -> String {
    let city: String = CityName().fake();
    let state: String = StateAbbr().fake();
    format!("{}, {}, {} {}", street_address(), city, state, zip_code())
}

pub(super) fn city() -> String {
    CityName().fake()
}

/// US ZIP code: five digits, one in four with a `-####` extension
pub(super) fn zip_code() -> String {
    let zip = sample_chars(DIGITS, 5);
    if rand::random_range(0..4) == 0 {
        format!("{}-{}", zip, sample_chars(DIGITS, 4))
    } else {
        zip
    }
}

pub(super) fn ipv4() -> String {
    format!(
        "{}.{}.{}.{}",
        rand::random_range(1..=254u8),
        rand::random_range(0..=255u8),
        rand::random_range(0..=255u8),
        rand::random_range(1..=254u8)
    )
}

pub(super) fn url() -> String {
    let host: String = Word().fake();
    let suffix: String = DomainSuffix().fake();
    let path: String = Word().fake();
    format!("https://www.{}.{}/{}", host, suffix, path)
}

pub(super) fn sentence() -> String {
    Sentence(4..10).fake()
}
