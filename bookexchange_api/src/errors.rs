use serde::Serialize;

/// Error code and user-facing message, serialized as `{"code": .., "message": ..}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub code: &'static str,
    pub message: &'static str,
}

pub const UNREGISTERED_USER: ErrorCode = ErrorCode {
    code: "UNREGISTERED_USER",
    message: "El correo electrónico no está registrado.",
};

pub const UNAUTHENTICATED: ErrorCode = ErrorCode {
    code: "UNAUTHENTICATED",
    message: "No has ingresado sesión.",
};

pub const UNVALIDATED: ErrorCode = ErrorCode {
    code: "UNVALIDATED",
    message: "Debes validar tu correo electrónico antes de iniciar sesión.",
};

pub const TOKEN_EXPIRED: ErrorCode = ErrorCode {
    code: "TOKEN_EXPIRED",
    message: "Este link ha expirado, pide uno nuevo.",
};

pub const INCORRECT_PASSWORD: ErrorCode = ErrorCode {
    code: "INCORRECT_PASSWORD",
    message: "La contraseña o usuario son incorrectos.",
};

pub const UNKOWN_ERROR: ErrorCode = ErrorCode {
    code: "UNKOWN_ERROR",
    message: "Ocurrió un error desconocido.",
};

pub const UNKOWN_ERROR_CREATE_USER: ErrorCode = ErrorCode {
    code: "UNKOWN_ERROR_CREATE_USER",
    message: "Ocurrió un error creando el usuario.",
};

pub const USER_NOT_FOUND: ErrorCode = ErrorCode {
    code: "USER_NOT_FOUND",
    message: "El usuario no fue encontrado.",
};

pub const UNAUTHORIZED: ErrorCode = ErrorCode {
    code: "UNAUTHORIZED",
    message: "No tienes permiso para acceder a este recurso",
};

pub const BAD_REQUEST: ErrorCode = ErrorCode {
    code: "BAD_REQUEST",
    message: "Bad request",
};

pub const INVALID_EMAIL: ErrorCode = ErrorCode {
    code: "INVALID_EMAIL",
    message: "El correo electrónico no es válido.",
};

pub const INVALID_PASSWORD: ErrorCode = ErrorCode {
    code: "INVALID_PASSWORD",
    message: "La contraseña debe de tener una longitud minima de 8 caracteres, además de contener minimo una letra mayúscula, una minúscula, un número.",
};

pub const USER_ALREADY_EXISTS: ErrorCode = ErrorCode {
    code: "USER_ALREADY_EXISTS",
    message: "Ese correo electrónico ya está registrado, intenta ingresando sesión.",
};

pub const NOT_FOUND: ErrorCode = ErrorCode {
    code: "NOT_FOUND",
    message: "El recurso no fue encontrado.",
};

pub const MISSING_ID: ErrorCode = ErrorCode {
    code: "MISSING_ID",
    message: "El campo `id` es obligatorio.",
};

pub const INTERNAL_SERVER: ErrorCode = ErrorCode {
    code: "INTERNAL_SERVER_ERROR",
    message: "Ocurrió un error en el servidor.",
};

pub const ALREADY_VALIDATED: ErrorCode = ErrorCode {
    code: "ALREADY_VALIDATED",
    message: "El correo electrónico para este usuario ya fue validado, intenta ingresar.",
};

pub const EMAIL_COULD_NOT_BE_SENT: ErrorCode = ErrorCode {
    code: "EMAIL_COULD_NOT_BE_SENT",
    message: "El correo de verificación no se pudo enviar.",
};

pub const SUBMISSION_NOT_FOUND: ErrorCode = ErrorCode {
    code: "SUBMISSION_NOT_FOUND",
    message: "No se pudo encontrar una submission para el usuario.",
};
