//! Process exit statuses

use pdfops_core::FailureClass;

pub const SUCCESS: u8 = 0;
/// The PDF engine failed while transforming the document
pub const OPERATION: u8 = 1;
/// Bad command line, option value or config file
pub const USAGE: u8 = 2;
/// Input could not be opened, parsed or decrypted
pub const OPEN: u8 = 3;
/// Output could not be written
pub const WRITE: u8 = 4;

pub fn exit_code(class: FailureClass) -> u8 {
    match class {
        FailureClass::Operation => OPERATION,
        FailureClass::InvalidInput => USAGE,
        FailureClass::Open => OPEN,
        FailureClass::Write => WRITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfops_core::PdfOpsError;

    #[test]
    fn test_failure_classes_have_distinct_codes() {
        let codes = [
            exit_code(FailureClass::Operation),
            exit_code(FailureClass::InvalidInput),
            exit_code(FailureClass::Open),
            exit_code(FailureClass::Write),
        ];
        for (i, code) in codes.iter().enumerate() {
            assert_ne!(*code, SUCCESS);
            assert!(!codes[i + 1..].contains(code));
        }
    }

    #[test]
    fn test_wrong_password_exits_with_open_code() {
        let err = PdfOpsError::DecryptError("incorrect password".into());
        assert_eq!(exit_code(err.class()), OPEN);
    }
}
