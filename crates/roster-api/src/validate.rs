use roster_types::api::ErrorMessage;

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 64;

pub fn validate_create_user(email: &str, password: &str) -> Vec<ErrorMessage> {
    let mut errors = Vec::new();

    if email.is_empty() {
        errors.push(ErrorMessage::new(
            "Validation error: body must have required property 'email'",
        ));
    }
    if password.is_empty() {
        errors.push(ErrorMessage::new(
            "Validation error: body must have required property 'password'",
        ));
    } else if let Some(error) = validate_password(password) {
        errors.push(error);
    }

    errors
}

pub fn validate_update_user(email: Option<&str>, password: Option<&str>) -> Vec<ErrorMessage> {
    let mut errors = Vec::new();

    if let Some(email) = email {
        if email.is_empty() {
            errors.push(ErrorMessage::new(
                "Validation error: body/email must not be empty",
            ));
        }
    }
    if let Some(password) = password {
        if let Some(error) = validate_password(password) {
            errors.push(error);
        }
    }

    errors
}

fn validate_password(password: &str) -> Option<ErrorMessage> {
    if password.len() < PASSWORD_MIN {
        return Some(ErrorMessage::new(
            "Validation error: body/password must NOT have fewer than 8 characters",
        ));
    }
    if password.len() > PASSWORD_MAX {
        return Some(ErrorMessage::new(
            "Validation error: body/password must NOT have more than 64 characters",
        ));
    }
    None
}
