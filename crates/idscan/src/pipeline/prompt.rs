//! Deterministic prompts for the structured extraction stage.

use super::fields::IdField;

pub const SYSTEM_PROMPT: &str = "Eres un asistente especializado en analizar el texto, obtenido \
por OCR, de licencias de conducir o DNIs. Respondes únicamente con un objeto JSON válido, sin \
texto adicional ni bloques de código. Nunca inventas información: si un dato no aparece en el \
texto, su valor es null.";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn field_description(field: IdField) -> &'static str {
    match field {
        IdField::ApellidoPaterno => {
            "primer apellido del titular, en MAYÚSCULAS y sin abreviaciones; es el primero de la \
             sección de apellidos"
        }
        IdField::ApellidoMaterno => {
            "segundo apellido del titular, en MAYÚSCULAS y sin abreviaciones; es el segundo de la \
             sección de apellidos"
        }
        IdField::Nombres => {
            "nombres completos del titular, en MAYÚSCULAS y sin abreviaciones; puede incluir \
             varios nombres"
        }
        IdField::FechaEmision => {
            "fecha de emisión en formato DD/MM/AAAA; también puede aparecer como fecha de expedición"
        }
        IdField::FechaCaducidad => {
            "fecha de caducidad en formato DD/MM/AAAA; también puede aparecer como fecha de \
             vencimiento, expiración o revalidación"
        }
        IdField::TipoDocumento => {
            "tipo de documento; debe ser uno de: \"DNI\", \"LICENCIA DE CONDUCIR\", \"PASAPORTE\", \
             \"CARNET DE EXTRANJERÍA\". Si no está claro, usa null"
        }
        IdField::NumeroDocumento => {
            "número completo del documento, sin espacios ni guiones; en los DNI suele estar \
             después de la palabra PER y tiene 8 dígitos. Si no está claro, usa null"
        }
    }
}

/// Builds the system and user prompt for `raw_text`. The same input always
/// yields the same prompt.
pub fn build_prompt(raw_text: &str) -> Prompt {
    let mut user = String::from(
        "Extrae los siguientes campos del texto de un documento de identidad.\n\nCampos:\n",
    );
    for field in IdField::ALL {
        user.push_str(&format!("- \"{}\": {}\n", field.key(), field_description(field)));
    }
    user.push_str(
        "\nReglas:\n\
         - Si un campo no aparece en el texto, usa null. No inventes valores.\n\
         - Mantén los formatos originales; no normalices salvo lo indicado en cada campo.\n\
         - Escribe apellidos y nombres en MAYÚSCULAS.\n\
         - Si un campo tiene varios valores posibles, usa el más específico.\n\
         - Responde solo con un objeto JSON que tenga exactamente esas siete claves.\n\
         \nTexto del documento:\n\"\"\"\n",
    );
    user.push_str(raw_text);
    user.push_str("\n\"\"\"");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
