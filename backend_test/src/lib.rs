use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// By default the test gets a [`rocket::local::asynchronous::Client`] over
/// fresh in-memory stores.
///
/// With `#[backend_test(mongo)]` the stores live in a throwaway MongoDB
/// database on the server named by `ROCKET_DB_URI`, which is dropped
/// regardless of how the test terminates. Such tests are ignored unless run
/// with `--ignored`, and may also inject [`mongodb::Database`] and
/// `crate::model::mongodb::Coll<T>`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let mongo = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongo" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected nothing or `mongo`")
                .into_compile_error()
                .into();
        }
    };

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), mongo) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    if mongo {
        mongo_test(name, new_name, item_fn, test_args)
    } else {
        memory_test(name, new_name, item_fn)
    }
    .into()
}

/// A test over in-memory stores. Nothing outlives the test, so there is no
/// cleanup.
fn memory_test(name: Ident, new_name: Ident, item_fn: ItemFn) -> TokenStream2 {
    let call_args = if item_fn.sig.inputs.is_empty() {
        quote! {}
    } else {
        quote! { rocket_client }
    };

    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Tests enter backend code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(["portfolio_backend"], None, None);

            runtime.block_on(async {
                let rocket_client = crate::memory_client().await;
                #new_name(#call_args).await;
            });
        }
    }
}

/// A test against a live database, which is dropped even if the test panics.
fn mongo_test(name: Ident, new_name: Ident, item_fn: ItemFn, test_args: TestArgs) -> TokenStream2 {
    let TestArgs {
        args,
        collection_idents,
        collection_types,
    } = test_args;

    quote! {
        #[test]
        #[ignore = "requires a running MongoDB instance"]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, mongodb::Database) {
                let db = crate::mongo_database().await;
                let rocket_client = crate::mongo_client(&db).await;
                (rocket_client, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Tests enter backend code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(["portfolio_backend"], None, None);

            // Run the setup.
            let (rocket_client, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
}

/// The parameters to pass to the wrapped test, in declaration order.
struct TestArgs {
    args: Vec<TokenStream2>,
    collection_idents: Vec<Ident>,
    collection_types: Vec<Ident>,
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject
/// unknown parameters. Only mongo tests may ask for a `Database` or `Coll<T>`.
fn check_sig(sig: Signature, mongo: bool) -> Result<TestArgs, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut args = vec![];
    let mut collection_idents = vec![];
    let mut collection_types = vec![];

    let expected = if mongo {
        "Expected one of `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`"
    } else {
        "Expected `client_ident: Client`; use `#[backend_test(mongo)]` for database access"
    };

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Database" && mongo {
                            if has_db {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `mongodb::Database`",
                                ));
                            }
                            has_db = true;
                            args.push(quote! { db });
                            continue;
                        }
                    } else if mongo {
                        // Valid as the last path segment for any type is itself
                        let possible_collection = type_path.path.segments.last().unwrap();
                        if possible_collection.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_collection.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        let ident = pat_ident.ident.clone();
                                        args.push(quote! { #ident });
                                        collection_idents.push(ident);
                                        collection_types.push(type_ident.clone());
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(input.span(), expected));
    }

    Ok(TestArgs {
        args,
        collection_idents,
        collection_types,
    })
}
