//! Certificate builder utilities.
//!
//! This module provides the pieces shared by the CA and endpoint templates:
//! subject names, serial numbers and validity windows.

use crate::error::{IcertError, Result};
use rand::{CryptoRng, RngCore};
use rcgen::{CertificateParams, DistinguishedName, DnType, SerialNumber};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Length in bytes of generated serial numbers.
pub const SERIAL_NUMBER_LEN: usize = 20;

const OID_STREET_ADDRESS: [u64; 4] = [2, 5, 4, 9];
const OID_POSTAL_CODE: [u64; 4] = [2, 5, 4, 17];

/// The subject identity placed in a certificate.
///
/// All fields are optional pass-through strings. A certificate subject must
/// carry at least one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectName {
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub locality: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
}

impl SubjectName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn common_name(mut self, common_name: &str) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    pub fn organization(mut self, organization: &str) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn organizational_unit(mut self, organizational_unit: &str) -> Self {
        self.organizational_unit = Some(organizational_unit.into());
        self
    }

    /// Country, a two letter ISO 3166-1 code
    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn province(mut self, province: &str) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn locality(mut self, locality: &str) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn street_address(mut self, street_address: &str) -> Self {
        self.street_address = Some(street_address.into());
        self
    }

    pub fn postal_code(mut self, postal_code: &str) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    fn entries(&self) -> Vec<(DnType, &str)> {
        [
            (DnType::CountryName, &self.country),
            (DnType::StateOrProvinceName, &self.province),
            (DnType::LocalityName, &self.locality),
            (DnType::CustomDnType(OID_STREET_ADDRESS.to_vec()), &self.street_address),
            (DnType::CustomDnType(OID_POSTAL_CODE.to_vec()), &self.postal_code),
            (DnType::OrganizationName, &self.organization),
            (DnType::OrganizationalUnitName, &self.organizational_unit),
            (DnType::CommonName, &self.common_name),
        ]
        .into_iter()
        .filter_map(|(dn_type, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (dn_type, v))
        })
        .collect()
    }

    /// True when no attribute carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Convert into an rcgen distinguished name.
    pub fn to_distinguished_name(&self) -> Result<DistinguishedName> {
        let entries = self.entries();
        if entries.is_empty() {
            return Err(IcertError::TemplateBuildFailed(
                "Subject must contain at least one attribute".to_string(),
            ));
        }

        let mut dn = DistinguishedName::new();
        for (dn_type, value) in entries {
            dn.push(dn_type, value);
        }
        Ok(dn)
    }
}

/// Parse a subject string (e.g., "CN=example.com,O=Example Org") into a SubjectName.
///
/// Recognized keys are `CN`, `O`, `OU`, `C`, `ST`, `L`, `STREET` and `POSTALCODE`.
///
/// # Example
///
/// ```
/// use icert::cert::builder::parse_subject;
///
/// let subject = parse_subject("CN=example.com,O=Example Org").unwrap();
/// assert_eq!(subject.organization.as_deref(), Some("Example Org"));
/// ```
pub fn parse_subject(subject: &str) -> Result<SubjectName> {
    let mut name = SubjectName::new();

    for part in subject.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim();
            let value = value.trim();

            let field = match key.to_uppercase().as_str() {
                "CN" => &mut name.common_name,
                "C" => &mut name.country,
                "O" => &mut name.organization,
                "OU" => &mut name.organizational_unit,
                "ST" => &mut name.province,
                "L" => &mut name.locality,
                "STREET" => &mut name.street_address,
                "POSTALCODE" => &mut name.postal_code,
                _ => {
                    return Err(IcertError::TemplateBuildFailed(format!(
                        "Unknown DN type: {}",
                        key
                    )))
                }
            };

            *field = Some(value.to_string());
        } else {
            return Err(IcertError::TemplateBuildFailed(format!(
                "Invalid subject format: {}",
                part
            )));
        }
    }

    if name.is_empty() {
        return Err(IcertError::TemplateBuildFailed(
            "Subject cannot be empty".to_string(),
        ));
    }

    Ok(name)
}

/// Draw a random, positive serial number of at most 159 bits.
pub fn generate_serial_number<R>(rng: &mut R) -> SerialNumber
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    rng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7F; // Ensure positive

    SerialNumber::from_slice(&bytes)
}

/// Compute the validity window `[now, now + ttl]`.
pub fn validity_window(ttl: Duration) -> Result<(OffsetDateTime, OffsetDateTime)> {
    if ttl.is_zero() {
        return Err(IcertError::TemplateBuildFailed(
            "Certificate TTL must be greater than zero".to_string(),
        ));
    }

    let not_before = OffsetDateTime::now_utc();
    let not_after = time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| not_before.checked_add(ttl))
        .ok_or_else(|| {
            IcertError::TemplateBuildFailed(format!("Certificate TTL {:?} is out of range", ttl))
        })?;

    Ok((not_before, not_after))
}

/// Start a certificate template with subject, serial and validity filled in.
pub fn base_params<R>(
    rng: &mut R,
    subject: &SubjectName,
    ttl: Duration,
) -> Result<CertificateParams>
where
    R: RngCore + CryptoRng,
{
    let (not_before, not_after) = validity_window(ttl)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = subject.to_distinguished_name()?;
    params.serial_number = Some(generate_serial_number(rng));
    params.not_before = not_before;
    params.not_after = not_after;

    Ok(params)
}
