const NO_AUTH_REQUIRED: u8 = 0x00;
const GSSAPI: u8 = 0x01;
const USERNAME_PASSWORD: u8 = 0x02;

const IANA_ASSIGNED_LOWER: u8 = 0x03;
const IANA_ASSIGNED_UPPER: u8 = 0x7F;

const PRIVATE_METHOD_LOWER: u8 = 0x80;
const PRIVATE_METHOD_UPPER: u8 = 0xFE;

const NO_ACCEPTABLE_METHODS: u8 = 0xFF;

/// Added to the offered method code when the proxy connection is TLS-wrapped.
pub(crate) const TLS_METHOD_OFFSET: u8 = 0x80;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// The `AuthMethod` enum represents the various authentication methods supported by the SOCKS5 protocol.
pub enum AuthMethod {
    /// No authentication is required.
    NoAuthRequired,

    /// GSSAPI authentication method. Never offered by this client.
    Gssapi,

    /// Username and password authentication method (RFC 1929).
    UsernamePassword,

    /// IANA assigned authentication methods, represented by a `u8` value.
    IanaAssigned(u8),

    /// Private authentication methods. The TLS-carrying variants of
    /// `NoAuthRequired` and `UsernamePassword` live in this range.
    PrivateMethods(u8),

    /// The server accepts none of the offered methods.
    NoAcceptableMethods,
}

impl AuthMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            NO_AUTH_REQUIRED => AuthMethod::NoAuthRequired,
            GSSAPI => AuthMethod::Gssapi,
            USERNAME_PASSWORD => AuthMethod::UsernamePassword,
            IANA_ASSIGNED_LOWER..=IANA_ASSIGNED_UPPER => AuthMethod::IanaAssigned(value),
            PRIVATE_METHOD_LOWER..=PRIVATE_METHOD_UPPER => AuthMethod::PrivateMethods(value),
            NO_ACCEPTABLE_METHODS => AuthMethod::NoAcceptableMethods,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            AuthMethod::NoAuthRequired => NO_AUTH_REQUIRED,
            AuthMethod::Gssapi => GSSAPI,
            AuthMethod::UsernamePassword => USERNAME_PASSWORD,
            AuthMethod::IanaAssigned(value) => value,
            AuthMethod::PrivateMethods(value) => value,
            AuthMethod::NoAcceptableMethods => NO_ACCEPTABLE_METHODS,
        }
    }

    /// The code put on the wire, shifted into the private range over TLS.
    pub fn wire_code(self, tls: bool) -> u8 {
        if tls {
            self.to_u8().wrapping_add(TLS_METHOD_OFFSET)
        } else {
            self.to_u8()
        }
    }

    /// Interprets a method chosen by the server, undoing the TLS shift for
    /// the two methods this client can offer.
    pub fn from_chosen(value: u8, tls: bool) -> Self {
        match value {
            v if tls && v == NO_AUTH_REQUIRED + TLS_METHOD_OFFSET => AuthMethod::NoAuthRequired,
            v if tls && v == USERNAME_PASSWORD + TLS_METHOD_OFFSET => {
                AuthMethod::UsernamePassword
            }
            v => AuthMethod::from_u8(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_decodes() {
        for value in 0..=u8::MAX {
            assert_eq!(AuthMethod::from_u8(value).to_u8(), value);
        }
    }

    #[test]
    fn tls_shift() {
        assert_eq!(AuthMethod::NoAuthRequired.wire_code(true), 0x80);
        assert_eq!(AuthMethod::UsernamePassword.wire_code(true), 0x82);
        assert_eq!(AuthMethod::UsernamePassword.wire_code(false), 0x02);
    }

    #[test]
    fn chosen_method_over_tls() {
        assert_eq!(
            AuthMethod::from_chosen(0x82, true),
            AuthMethod::UsernamePassword
        );
        assert_eq!(
            AuthMethod::from_chosen(0x02, true),
            AuthMethod::UsernamePassword
        );
        assert_eq!(
            AuthMethod::from_chosen(0x80, false),
            AuthMethod::PrivateMethods(0x80)
        );
        assert_eq!(
            AuthMethod::from_chosen(0xFF, true),
            AuthMethod::NoAcceptableMethods
        );
    }
}
