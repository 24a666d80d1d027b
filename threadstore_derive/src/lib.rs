use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Type,
    parse_macro_input,
};

/// Derives the `Record` trait for a struct with named fields.
///
/// Field types map onto store types: `i64`, `i32` and `u32` become
/// INTEGER; `f64` and `f32` FLOAT; `String` TEXT; `bool` BOOLEAN; and
/// `Option<X>` a nullable X. Mark at most one integer or `String` field
/// `#[record(primary_key)]`. The record type is named after the struct
/// unless `#[record(rename = "...")]` says otherwise.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum BaseType {
    I64,
    I32,
    U32,
    F64,
    F32,
    Str,
    Bool,
}

struct RecordField {
    ident: Ident,
    base: BaseType,
    nullable: bool,
    primary_key: bool,
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record does not support generic structs",
        ));
    }

    let record_type = parse_rename(&input.attrs)?.unwrap_or_else(|| struct_name.to_string());

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record requires named fields",
            ));
        }
    };

    let mut fields = Vec::<RecordField>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let primary_key = parse_primary_key(&field.attrs)?;
        let (base, nullable) = classify(&field.ty).ok_or_else(|| {
            syn::Error::new(
                field.ty.span(),
                "unsupported field type; expected i64, i32, u32, f64, f32, String, bool, \
                 or Option of one of these",
            )
        })?;
        if primary_key && nullable {
            return Err(syn::Error::new(
                field.span(),
                "a primary key field cannot be Option",
            ));
        }
        if primary_key && !matches!(base, BaseType::I64 | BaseType::I32 | BaseType::U32 | BaseType::Str)
        {
            return Err(syn::Error::new(
                field.span(),
                "a primary key field must be an integer or String",
            ));
        }
        fields.push(RecordField {
            ident,
            base,
            nullable,
            primary_key,
        });
    }

    if fields.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "Record requires at least one field",
        ));
    }
    if fields.iter().filter(|f| f.primary_key).count() > 1 {
        return Err(syn::Error::new(
            struct_name.span(),
            "at most one field may be #[record(primary_key)]",
        ));
    }

    let schema_fields = fields.iter().map(schema_field_tokens);
    let to_state_inserts = fields.iter().map(to_state_tokens);
    let from_state_lets = fields
        .iter()
        .map(|field| from_state_tokens(field, &record_type));
    let field_idents = fields.iter().map(|f| &f.ident);

    Ok(quote! {
        impl ::threadstore::Record for #struct_name {
            fn record_type() -> &'static str {
                #record_type
            }

            fn schema() -> ::threadstore::RecordSchema {
                ::threadstore::RecordSchema::new(#record_type, vec![#(#schema_fields),*])
            }

            fn to_state(&self) -> ::threadstore::Result<::threadstore::RecordState> {
                let mut state = ::threadstore::RecordState::new();
                #(#to_state_inserts)*
                Ok(state)
            }

            fn from_state(
                state: &::threadstore::RecordState,
            ) -> ::threadstore::Result<Self> {
                #(#from_state_lets)*
                Ok(Self {
                    #(#field_idents),*
                })
            }
        }
    })
}

fn classify(ty: &Type) -> Option<(BaseType, bool)> {
    if let Some(inner) = option_inner(ty) {
        return Some((base_of(inner)?, true));
    }
    Some((base_of(ty)?, false))
}

fn base_of(ty: &Type) -> Option<BaseType> {
    let Type::Path(path) = ty else { return None };
    if path.qself.is_some() {
        return None;
    }
    let segment = path.path.segments.last()?;
    if !segment.arguments.is_none() {
        return None;
    }
    match segment.ident.to_string().as_str() {
        "i64" => Some(BaseType::I64),
        "i32" => Some(BaseType::I32),
        "u32" => Some(BaseType::U32),
        "f64" => Some(BaseType::F64),
        "f32" => Some(BaseType::F32),
        "String" => Some(BaseType::Str),
        "bool" => Some(BaseType::Bool),
        _ => None,
    }
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn field_type_tokens(base: BaseType) -> TokenStream2 {
    match base {
        BaseType::I64 | BaseType::I32 | BaseType::U32 => {
            quote!(::threadstore::FieldType::Integer)
        }
        BaseType::F64 | BaseType::F32 => quote!(::threadstore::FieldType::Float),
        BaseType::Str => quote!(::threadstore::FieldType::Text),
        BaseType::Bool => quote!(::threadstore::FieldType::Boolean),
    }
}

fn schema_field_tokens(field: &RecordField) -> TokenStream2 {
    let name = field.ident.to_string();
    let field_type = field_type_tokens(field.base);
    let mut def = quote!(::threadstore::FieldDef::new(#name, #field_type));
    if field.nullable {
        def = quote!(#def.nullable());
    }
    if field.primary_key {
        def = quote!(#def.primary_key());
    }
    def
}

/// Expression converting `value: &T` into a `Value`.
fn value_from_ref_tokens(base: BaseType) -> TokenStream2 {
    match base {
        BaseType::I64 => quote!(::threadstore::Value::Integer(*value)),
        BaseType::I32 | BaseType::U32 => {
            quote!(::threadstore::Value::Integer(i64::from(*value)))
        }
        BaseType::F64 => quote!(::threadstore::Value::Float(*value)),
        BaseType::F32 => quote!(::threadstore::Value::Float(f64::from(*value))),
        BaseType::Str => quote!(::threadstore::Value::Text(value.clone())),
        BaseType::Bool => quote!(::threadstore::Value::Boolean(*value)),
    }
}

fn to_state_tokens(field: &RecordField) -> TokenStream2 {
    let ident = &field.ident;
    let name = ident.to_string();
    let convert = value_from_ref_tokens(field.base);
    if field.nullable {
        quote! {
            state.insert(
                #name.to_string(),
                match &self.#ident {
                    Some(value) => #convert,
                    None => ::threadstore::Value::Null,
                },
            );
        }
    } else {
        quote! {
            state.insert(#name.to_string(), {
                let value = &self.#ident;
                #convert
            });
        }
    }
}

/// Match arms converting a non-null `Value` back into the field's type.
fn value_to_field_arms(base: BaseType, name: &str, record_type: &str) -> TokenStream2 {
    match base {
        BaseType::I64 => quote!(::threadstore::Value::Integer(raw) => *raw,),
        BaseType::I32 => quote! {
            ::threadstore::Value::Integer(raw) => i32::try_from(*raw).map_err(|_| {
                ::threadstore::StoreError::TypeMismatch(format!(
                    "field '{}' of '{}' is out of range for i32", #name, #record_type,
                ))
            })?,
        },
        BaseType::U32 => quote! {
            ::threadstore::Value::Integer(raw) => u32::try_from(*raw).map_err(|_| {
                ::threadstore::StoreError::TypeMismatch(format!(
                    "field '{}' of '{}' is out of range for u32", #name, #record_type,
                ))
            })?,
        },
        BaseType::F64 => quote! {
            ::threadstore::Value::Float(raw) => *raw,
            ::threadstore::Value::Integer(raw) => *raw as f64,
        },
        BaseType::F32 => quote! {
            ::threadstore::Value::Float(raw) => *raw as f32,
            ::threadstore::Value::Integer(raw) => *raw as f32,
        },
        BaseType::Str => quote!(::threadstore::Value::Text(raw) => raw.clone(),),
        BaseType::Bool => quote!(::threadstore::Value::Boolean(raw) => *raw,),
    }
}

fn expected_type_name(base: BaseType) -> &'static str {
    match base {
        BaseType::I64 | BaseType::I32 | BaseType::U32 => "INTEGER",
        BaseType::F64 | BaseType::F32 => "FLOAT",
        BaseType::Str => "TEXT",
        BaseType::Bool => "BOOLEAN",
    }
}

fn from_state_tokens(field: &RecordField, record_type: &str) -> TokenStream2 {
    let ident = &field.ident;
    let name = ident.to_string();
    let arms = value_to_field_arms(field.base, &name, record_type);
    let expected = expected_type_name(field.base);
    let mismatch = quote! {
        other => {
            return Err(::threadstore::StoreError::TypeMismatch(format!(
                "field '{}' of '{}' expects {}, got {}",
                #name, #record_type, #expected, other.type_name(),
            )));
        }
    };
    if field.nullable {
        quote! {
            let #ident = {
                let value = state.get(#name).unwrap_or(&::threadstore::Value::Null);
                match value {
                    ::threadstore::Value::Null => None,
                    value => Some(match value {
                        #arms
                        #mismatch
                    }),
                }
            };
        }
    } else {
        quote! {
            let #ident = {
                let value = state.get(#name).unwrap_or(&::threadstore::Value::Null);
                match value {
                    #arms
                    #mismatch
                }
            };
        }
    }
}

fn parse_rename(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute; expected `rename = \"...\"`"))
            }
        })?;
    }
    Ok(rename)
}

fn parse_primary_key(attrs: &[syn::Attribute]) -> syn::Result<bool> {
    let mut primary_key = false;
    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                primary_key = true;
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute; expected `primary_key`"))
            }
        })?;
    }
    Ok(primary_key)
}
